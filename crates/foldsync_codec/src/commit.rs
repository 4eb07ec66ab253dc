//! Commit object encoding.

use crate::error::{CodecError, CodecResult};
use crate::hash::Hash;
use chrono::{DateTime, FixedOffset, Local, TimeZone};
use std::fmt;

/// Identity and timestamp attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// E-mail address.
    pub email: String,
    /// Time with the offset it was recorded in.
    pub date: DateTime<FixedOffset>,
}

impl Author {
    /// Creates an author stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date: Local::now().fixed_offset(),
        }
    }

    /// Creates an author with an explicit date.
    pub fn at(
        name: impl Into<String>,
        email: impl Into<String>,
        date: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date,
        }
    }

    /// Unix seconds of the recorded date.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.date.timestamp()
    }

    /// Parses `"<name> <<email>> <unix-secs> <+HHMM>"`.
    pub fn parse(value: &str) -> CodecResult<Self> {
        let bad = || CodecError::format(format!("invalid author line {value:?}"));

        let (rest, tz) = value.rsplit_once(' ').ok_or_else(bad)?;
        let (rest, secs) = rest.rsplit_once(' ').ok_or_else(bad)?;
        let rest = rest.strip_suffix('>').ok_or_else(bad)?;
        let (name, email) = rest.rsplit_once(" <").ok_or_else(bad)?;
        if name.is_empty() || email.is_empty() {
            return Err(bad());
        }

        let secs: i64 = secs.parse().map_err(|_| bad())?;
        let offset = parse_offset(tz).ok_or_else(bad)?;
        let date = offset.timestamp_opt(secs, 0).single().ok_or_else(bad)?;

        Ok(Self::at(name, email, date))
    }
}

fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz.len() != 5 || !tz.is_ascii() {
        return None;
    }
    let sign = match &tz[..1] {
        "+" => 1,
        "-" => -1,
        _ => return None,
    };
    let hours: i32 = tz[1..3].parse().ok()?;
    let minutes: i32 = tz[3..5].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let offset = self.date.offset().local_minus_utc();
        let sign = if offset < 0 { '-' } else { '+' };
        let offset = offset.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.date.timestamp(),
            sign,
            offset / 3600,
            (offset % 3600) / 60
        )
    }
}

/// Decoded commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    /// Root tree of the snapshot.
    pub tree: Hash,
    /// Zero, one or two parents. The first parent is the local line.
    pub parents: Vec<Hash>,
    /// Who made the change.
    pub author: Author,
    /// Who recorded it.
    pub committer: Author,
    /// Free-form message.
    pub message: String,
}

/// Encodes a commit as header lines, a blank line and the message.
#[must_use]
pub fn encode_commit(entry: &CommitEntry) -> Vec<u8> {
    let mut lines = Vec::with_capacity(entry.parents.len() + 5);
    lines.push(format!("tree {}", entry.tree));
    for parent in &entry.parents {
        lines.push(format!("parent {parent}"));
    }
    lines.push(format!("author {}", entry.author));
    lines.push(format!("committer {}", entry.committer));
    lines.push(String::new());
    lines.push(entry.message.clone());
    lines.join("\n").into_bytes()
}

/// Parses commit content.
pub fn decode_commit(content: &[u8]) -> CodecResult<CommitEntry> {
    let text =
        std::str::from_utf8(content).map_err(|_| CodecError::format("commit is not UTF-8"))?;

    let (headers, message) = match text.split_once("\n\n") {
        Some((headers, message)) => (headers, message),
        None => (text.strip_suffix('\n').unwrap_or(text), ""),
    };

    let mut tree = None;
    let mut parents = Vec::new();
    let mut author = None;
    let mut committer = None;

    for line in headers.lines() {
        if let Some(v) = line.strip_prefix("tree ") {
            tree = Some(Hash::parse(v)?);
        } else if let Some(v) = line.strip_prefix("parent ") {
            parents.push(Hash::parse(v)?);
        } else if let Some(v) = line.strip_prefix("author ") {
            author = Some(Author::parse(v)?);
        } else if let Some(v) = line.strip_prefix("committer ") {
            committer = Some(Author::parse(v)?);
        }
    }

    Ok(CommitEntry {
        tree: tree.ok_or_else(|| CodecError::format("commit has no tree"))?,
        parents,
        author: author.ok_or_else(|| CodecError::format("commit has no author"))?,
        committer: committer.ok_or_else(|| CodecError::format("commit has no committer"))?,
        message: message.to_string(),
    })
}
