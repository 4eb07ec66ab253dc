//! Error types for object store operations.

use foldsync_codec::{CodecError, Hash};
use std::io;
use thiserror::Error;

/// Result type for object store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during object store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The object is not present in the store.
    #[error("object {0} not found")]
    NotFound(Hash),

    /// A stored file has an unexpected layout.
    #[error("object store corrupted: {0}")]
    Corrupted(String),

    /// The stored state file could not be parsed or written.
    #[error("invalid state file: {0}")]
    State(#[from] serde_json::Error),

    /// Object bytes failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A remote fetch performed on behalf of the store failed.
    #[error("remote fetch failed: {0}")]
    Remote(String),
}

impl StorageError {
    /// Returns true if the error means the object simply is not there.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
