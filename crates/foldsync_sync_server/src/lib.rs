//! # foldsync Sync Server
//!
//! In-memory reference implementation of the foldsync remote.
//!
//! This crate provides:
//! - The five JSON actions (`create`, `get_head`, `set_head`, `upload`,
//!   `download`) dispatched from a `?action=` query parameter
//! - Atomic compare-and-swap of branch heads
//! - Write-once object pools stamped with arrival time
//!
//! The server keeps everything in memory. It backs the test suites and can
//! be wired to the client through a loopback HTTP client.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod repo;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use repo::HostedRepo;
pub use server::SyncServer;
