//! # foldsync Core
//!
//! The repository half of foldsync: everything that touches the working
//! directory or interprets objects.
//!
//! This crate provides:
//! - Working tree snapshots honouring `.gitignore` rules
//! - Tree diffs, merge-base search and three-way merge
//! - Checkout and diff application back onto disk
//! - HEAD, branch refs and MERGE_HEAD
//! - The working copy layout, lock and remote config
//!
//! ## Example
//!
//! ```rust
//! use foldsync_core::{RepoLayout, Repository, DEFAULT_META_DIR};
//! use foldsync_storage::MemoryObjectStore;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
//!
//! let repo = Repository::new(
//!     RepoLayout::new(dir.path(), DEFAULT_META_DIR),
//!     Arc::new(MemoryObjectStore::new()),
//! );
//! let tree = repo.build_working_tree().unwrap();
//! let changes = repo.diff_tree(&[], &tree).unwrap();
//! assert_eq!(changes[0].to_string(), "A notes.txt");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod diff;
mod dir;
mod error;
mod ignore;
mod refs;
mod repo;
mod scan;
mod text;
mod types;
mod walk;

pub use config::{generate_api_key, RepoConfig};
pub use diff::{Conflict, MergeOutcome, TreeDiffEntry};
pub use dir::{RepoDir, RepoLayout, DEFAULT_META_DIR};
pub use error::{CoreError, CoreResult};
pub use ignore::{IgnoreChecker, IgnoreRules, IgnoreStack, IGNORE_FILE};
pub use repo::{GitObject, Repository};
pub use scan::scan_working_copies;
pub use text::{normalize_line_endings, same_except_crlf};
pub use types::{BranchName, PathInRepo, RefName};
pub use walk::{History, TreeWalk};
