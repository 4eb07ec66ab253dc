//! Error types for the repository core.

use foldsync_codec::{Hash, ObjectKind};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in repository operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Object store error.
    #[error("storage error: {0}")]
    Storage(#[from] foldsync_storage::StorageError),

    /// Object encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] foldsync_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file could not be read or written.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// An object has a different type than the caller expected.
    #[error("object {hash} is a {actual}, expected a {expected}")]
    UnexpectedKind {
        /// The object read.
        hash: Hash,
        /// Type the caller asked for.
        expected: ObjectKind,
        /// Type found in the object header.
        actual: ObjectKind,
    },

    /// The two commits share no ancestor.
    #[error("unrelated histories: {a} and {b}")]
    UnrelatedHistory {
        /// First commit.
        a: Hash,
        /// Second commit.
        b: Hash,
    },

    /// The two sides of a merge disagree about the base content.
    #[error("merge invariant violated: {message}")]
    MergeInvariant {
        /// What disagreed.
        message: String,
    },

    /// HEAD does not name a branch.
    #[error("detached HEAD: {content:?}")]
    DetachedHead {
        /// Raw HEAD content.
        content: String,
    },

    /// A reference file is missing.
    #[error("reference not found: {name}")]
    RefNotFound {
        /// The reference looked up.
        name: String,
    },

    /// A name failed validation.
    #[error("invalid {kind}: {value:?}")]
    InvalidName {
        /// What kind of name was rejected.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// No metadata directory was found.
    #[error("not a working copy (or any parent): {}", .0.display())]
    NotARepository(PathBuf),

    /// The metadata directory already exists.
    #[error("already initialized: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Another process holds the working copy lock.
    #[error("working copy locked: another process has exclusive access")]
    Locked,
}

impl CoreError {
    /// Creates a merge invariant error.
    pub fn merge_invariant(message: impl Into<String>) -> Self {
        Self::MergeInvariant {
            message: message.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            value: value.into(),
        }
    }

    /// Creates a missing reference error.
    pub fn ref_not_found(name: impl Into<String>) -> Self {
        Self::RefNotFound { name: name.into() }
    }

    /// Returns true when the error is a missing object or reference.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_not_found(),
            Self::RefNotFound { .. } => true,
            _ => false,
        }
    }
}
