//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while framing, compressing or parsing objects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes do not follow the expected object layout.
    #[error("malformed object: {message}")]
    Format {
        /// Description of the formatting error.
        message: String,
    },

    /// The declared content length differs from the actual one.
    #[error("object size mismatch: header says {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Length declared in the object header.
        expected: usize,
        /// Length of the content that followed the header.
        actual: usize,
    },

    /// The object header names a type this codec does not know.
    #[error("unknown object type: {type_name}")]
    UnknownType {
        /// The type tag found in the header.
        type_name: String,
    },

    /// A string is not a valid hex object hash.
    #[error("invalid hash: {value:?}")]
    InvalidHash {
        /// The rejected input.
        value: String,
    },
}

impl CodecError {
    /// Create a format error.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid hash error.
    pub fn invalid_hash(value: impl Into<String>) -> Self {
        Self::InvalidHash {
            value: value.into(),
        }
    }
}
