//! # foldsync Storage
//!
//! Content-addressable persistence for compressed object bytes.
//!
//! Stores are **opaque**: they key bytes by hash and remember when each
//! object arrived, but never decompress or parse what they hold. Alongside
//! the object pool every store keeps one mutable record, the
//! [`SyncCursor`], which drives incremental uploads.
//!
//! ## Available Stores
//!
//! - [`FileObjectStore`] - durable, one file per object, sharded by prefix
//! - [`MemoryObjectStore`] - key-value map for tests and the reference remote
//!
//! A lazily downloading decorator lives in the sync engine crate, since it
//! needs a remote connection.
//!
//! ## Example
//!
//! ```rust
//! use foldsync_codec::{compress, hash_object, ObjectKind};
//! use foldsync_storage::{MemoryObjectStore, ObjectStore, Timestamp};
//!
//! let store = MemoryObjectStore::new();
//! let (hash, framed) = hash_object(ObjectKind::Blob, b"hello world");
//! store.put(&hash, &compress(&framed).unwrap()).unwrap();
//! assert_eq!(store.iterate(Timestamp::EPOCH).unwrap().count(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StorageError, StorageResult};
pub use file::FileObjectStore;
pub use memory::MemoryObjectStore;
pub use store::{ObjectEntry, ObjectIter, ObjectStore, ObjectValue, SyncCursor, Timestamp};
