//! Property-based test generators using proptest.
//!
//! Provides strategies for generating file names, contents and whole
//! directory layouts that are valid inside a working copy.

use chrono::{DateTime, FixedOffset};
use foldsync_codec::{Author, FileName};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for valid, visible file names.
pub fn file_name_strategy() -> impl Strategy<Value = FileName> {
    prop::string::string_regex("[a-zA-Z0-9_][a-zA-Z0-9_. -]{0,15}")
        .expect("Invalid regex")
        .prop_filter_map("Name must be a valid file name", |s| {
            FileName::parse(s.trim_end()).ok()
        })
}

/// Strategy for file contents.
pub fn file_content_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Strategy for text contents with mixed line endings.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (
            prop::string::string_regex("[a-z ]{0,12}").expect("Invalid regex"),
            prop::bool::ANY,
        ),
        0..8,
    )
    .prop_map(|lines| {
        lines
            .into_iter()
            .map(|(text, crlf)| format!("{text}{}", if crlf { "\r\n" } else { "\n" }))
            .collect()
    })
}

/// Strategy for a directory layout: relative paths to contents.
///
/// Paths are at most three levels deep. No path is a prefix directory of
/// another, so the layout can always be written to disk.
pub fn file_set_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let segment = prop::string::string_regex("[a-z][a-z0-9]{0,5}").expect("Invalid regex");
    let path = prop::collection::vec(segment, 1..4).prop_map(|mut parts| {
        let file = parts.pop().unwrap_or_default();
        let mut path: Vec<String> = parts.iter().map(|d| format!("{d}.d")).collect();
        path.push(format!("{file}.txt"));
        path.join("/")
    });
    prop::collection::btree_map(path, file_content_strategy(), 0..12)
}

/// Strategy for commit identities.
pub fn author_strategy() -> impl Strategy<Value = Author> {
    (
        prop::string::string_regex("[A-Z][a-z]{1,8}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,8}@[a-z]{1,8}\\.test").expect("Invalid regex"),
        0i64..4_000_000_000,
        -12i32..=14,
    )
        .prop_filter_map("Date must be representable", |(name, email, secs, hours)| {
            let offset = FixedOffset::east_opt(hours * 3600)?;
            let date = DateTime::from_timestamp(secs, 0)?.with_timezone(&offset);
            Some(Author::at(name, email, date))
        })
}
