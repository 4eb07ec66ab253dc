//! # foldsync Testkit
//!
//! Test utilities for foldsync.
//!
//! This crate provides:
//! - An in-process remote behind the loopback HTTP client
//! - Scratch workspaces holding several working copies
//! - File helpers for writing and listing working copies
//! - Property-based test generators using proptest
//! - Golden object hash vectors
//!
//! ## Usage
//!
//! ```rust
//! use foldsync_sync_engine::{ConflictPolicy, SyncStatus};
//! use foldsync_testkit::prelude::*;
//!
//! let ws = TestWorkspace::new();
//! let origin = ws.init("origin");
//! write_in(&origin, "hello.txt", "hi");
//! assert_eq!(origin.sync(ConflictPolicy::default()).unwrap(), SyncStatus::NewlyPushed);
//!
//! let copy = ws.clone_of(&origin, "copy");
//! assert_eq!(read_in(&copy, "hello.txt").as_deref(), Some("hi"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
