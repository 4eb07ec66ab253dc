//! Error types for wire message handling.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body is not the JSON shape the action expects.
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    /// Object content is not valid base64.
    #[error("invalid base64 content for object {hash}: {source}")]
    Base64 {
        /// Object whose content failed to decode.
        hash: String,
        /// Underlying decoder error.
        source: base64::DecodeError,
    },

    /// A hash field is malformed.
    #[error("codec error: {0}")]
    Codec(#[from] foldsync_codec::CodecError),

    /// The `action` query parameter names no known operation.
    #[error("unknown action: {0:?}")]
    UnknownAction(String),
}
