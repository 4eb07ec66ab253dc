//! Error types for the reference remote.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling a request.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request body or parameters are malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The body could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] foldsync_sync_protocol::ProtocolError),

    /// No repository has this id.
    #[error("repository {0} not found")]
    RepoNotFound(String),

    /// The branch has no head and the caller did not allow that.
    #[error("{repo_id}:{branch} not found")]
    HeadNotFound {
        /// Repository asked.
        repo_id: String,
        /// Branch asked.
        branch: String,
    },

    /// An uploaded object does not hash to its claimed id.
    #[error("object {claimed} does not match its content")]
    HashMismatch {
        /// Hash sent by the client.
        claimed: String,
    },

    /// The object pool failed.
    #[error("storage error: {0}")]
    Storage(#[from] foldsync_storage::StorageError),
}

impl ServerError {
    /// HTTP status the error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::Protocol(_) | Self::HashMismatch { .. } => 400,
            Self::RepoNotFound(_) | Self::HeadNotFound { .. } => 404,
            Self::Storage(_) => 500,
        }
    }

    /// Returns true if the client sent something wrong (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
