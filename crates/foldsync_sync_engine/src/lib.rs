//! # foldsync Sync Engine
//!
//! Keeps a working copy and a remote repository in step.
//!
//! This crate provides:
//! - Commit, push, fast-forward and three-way merge rounds
//! - Conflict policies for files changed on both sides
//! - Retrying rounds until the remote head settles
//! - `init`, `clone` and `open` of working copies
//! - An object store that downloads missing objects on demand
//! - The JSON-over-HTTP transport and a blocking `reqwest` client
//!
//! ## Architecture
//!
//! A round always commits first, then compares the local head with the
//! remote head:
//! 1. Remote branch missing: upload everything, create the branch
//! 2. Remote is an ancestor: upload, then compare-and-swap the head
//! 3. Local is an ancestor: apply the remote tree to the working copy
//! 4. Otherwise: merge, resolve conflicts, commit; the next round pushes
//!
//! ## Key Invariants
//!
//! - Objects are uploaded before the head that references them moves
//! - The remote head only moves through compare-and-swap
//! - The upload cursor advances only after every batch was accepted
//! - A conflicted merge leaves MERGE_HEAD set until the next commit

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod downloadable;
mod engine;
mod error;
mod http;
mod reqwest_client;
mod transport;

pub use config::SyncConfig;
pub use downloadable::DownloadableObjectStore;
pub use engine::{
    conflict_copy_path, AllowNonEmpty, CloneOptions, ConflictPolicy, LogEntry, SyncEngine,
    SyncStats, SyncStatus,
};
pub use error::{SyncError, SyncResult};
pub use http::{
    HttpClient, HttpConnector, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer,
};
pub use reqwest_client::ReqwestClient;
pub use transport::{Downloaded, RemoteApi, RemoteConnector};
