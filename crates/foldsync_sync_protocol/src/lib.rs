//! # foldsync Sync Protocol
//!
//! Wire messages of the remote API.
//!
//! This crate provides:
//! - [`Action`], the operation selected by the `action` query parameter
//! - Request/response bodies for `create`, `get_head`, `set_head`,
//!   `upload` and `download`
//! - [`WireObject`], compressed object bytes carried as base64
//! - [`HeadUpdate`], the typed reading of a `set_head` status
//!
//! Bodies are JSON. This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    from_body, to_body, Action, CreateRequest, CreateResponse, DownloadRequest,
    DownloadResponse, ErrorResponse, GetHeadRequest, GetHeadResponse, HeadUpdate,
    SetHeadRequest, SetHeadResponse, UploadRequest, UploadResponse, WireObject,
};
