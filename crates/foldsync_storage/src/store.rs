//! Object store trait definition.

use crate::error::StorageResult;
use foldsync_codec::Hash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix time in whole seconds, the resolution the remote works in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The epoch; `iterate(Timestamp::EPOCH)` yields every object.
    pub const EPOCH: Self = Self(0);

    /// Wraps a raw seconds value.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// The current wall-clock second.
    #[must_use]
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(i64::try_from(d.as_secs()).unwrap_or(i64::MAX)),
            Err(e) => Self(-i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX)),
        }
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        if ts.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(ts.0.unsigned_abs())
        } else {
            UNIX_EPOCH - Duration::from_secs(ts.0.unsigned_abs())
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored bytes of an object together with the time they were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectValue {
    /// Compressed framed object.
    pub content: Vec<u8>,
    /// When the object landed in this store.
    pub mtime: Timestamp,
}

/// An object yielded by [`ObjectStore::iterate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    /// Object identifier.
    pub hash: Hash,
    /// Compressed framed object.
    pub content: Vec<u8>,
    /// When the object landed in this store.
    pub mtime: Timestamp,
}

/// Per-repository upload progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    /// Objects stored at or after this second have not been uploaded yet.
    pub upload_since: Timestamp,
}

/// Lazy, finite sequence of stored objects.
pub type ObjectIter<'a> = Box<dyn Iterator<Item = StorageResult<ObjectEntry>> + 'a>;

/// Content-addressable storage for compressed object bytes.
///
/// Stores are **write-once**: putting a hash that is already present leaves
/// the existing bytes and mtime untouched. The store does not interpret the
/// bytes it holds.
///
/// # Invariants
///
/// - `get` returns exactly the bytes passed to the first `put` of that hash
/// - `iterate(since)` yields every object whose mtime is `>= since`
/// - Each call to `iterate` starts a fresh pass
/// - The sync cursor is only written through [`ObjectStore::set_cursor`]
///
/// # Implementors
///
/// - [`super::FileObjectStore`] - sharded directory on disk
/// - [`super::MemoryObjectStore`] - key-value map, for tests and the remote
pub trait ObjectStore: Send + Sync {
    /// Returns true if the object is present.
    ///
    /// # Errors
    ///
    /// Returns an error if presence cannot be determined.
    fn has(&self, hash: &Hash) -> StorageResult<bool>;

    /// Reads an object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the object is absent.
    fn get(&self, hash: &Hash) -> StorageResult<ObjectValue>;

    /// Stores compressed bytes under `hash`. A no-op if already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be persisted.
    fn put(&self, hash: &Hash, compressed: &[u8]) -> StorageResult<()>;

    /// Iterates objects stored at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot be started. Individual items may
    /// also carry errors.
    fn iterate(&self, since: Timestamp) -> StorageResult<ObjectIter<'_>>;

    /// Reads the sync cursor. A store that never had one returns the default.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored cursor cannot be read.
    fn cursor(&self) -> StorageResult<SyncCursor>;

    /// Persists the sync cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor cannot be written.
    fn set_cursor(&self, cursor: SyncCursor) -> StorageResult<()>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    fn has(&self, hash: &Hash) -> StorageResult<bool> {
        (**self).has(hash)
    }

    fn get(&self, hash: &Hash) -> StorageResult<ObjectValue> {
        (**self).get(hash)
    }

    fn put(&self, hash: &Hash, compressed: &[u8]) -> StorageResult<()> {
        (**self).put(hash, compressed)
    }

    fn iterate(&self, since: Timestamp) -> StorageResult<ObjectIter<'_>> {
        (**self).iterate(since)
    }

    fn cursor(&self) -> StorageResult<SyncCursor> {
        (**self).cursor()
    }

    fn set_cursor(&self, cursor: SyncCursor) -> StorageResult<()> {
        (**self).set_cursor(cursor)
    }
}
