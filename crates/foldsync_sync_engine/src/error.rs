//! Error types for the sync engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Merge conflicts and lost head races are not errors; they are reported
/// through [`crate::SyncStatus`].
#[derive(Error, Debug)]
pub enum SyncError {
    /// Repository error.
    #[error(transparent)]
    Core(#[from] foldsync_core::CoreError),

    /// Object store error.
    #[error(transparent)]
    Storage(#[from] foldsync_storage::StorageError),

    /// Object decoding error.
    #[error(transparent)]
    Codec(#[from] foldsync_codec::CodecError),

    /// Wire message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] foldsync_sync_protocol::ProtocolError),

    /// I/O error on the working directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote answered with an error status.
    #[error("remote returned {status}: {message}")]
    Remote {
        /// HTTP status.
        status: u16,
        /// Message from the error body.
        message: String,
    },

    /// The remote has no head for a branch that must exist.
    #[error("remote branch {branch} does not exist")]
    RemoteHeadMissing {
        /// Branch asked for.
        branch: String,
    },

    /// Clone target is not empty and no override was given.
    #[error("{} is not empty", .0.display())]
    NotEmpty(PathBuf),

    /// Every sync round ended in another auto-merge or head race.
    #[error("sync did not settle after {rounds} rounds")]
    RetryExhausted {
        /// Rounds attempted.
        rounds: u32,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if repeating the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad url").is_retryable());
        let server = SyncError::Remote {
            status: 503,
            message: "busy".into(),
        };
        assert!(server.is_retryable());
        let missing = SyncError::Remote {
            status: 404,
            message: "nope".into(),
        };
        assert!(!missing.is_retryable());
        assert!(!SyncError::RetryExhausted { rounds: 5 }.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::RemoteHeadMissing {
            branch: "main".into(),
        };
        assert_eq!(err.to_string(), "remote branch main does not exist");
        assert!(SyncError::RetryExhausted { rounds: 5 }
            .to_string()
            .contains('5'));
    }
}
