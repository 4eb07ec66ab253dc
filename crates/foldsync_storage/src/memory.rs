//! In-memory key-value object store.

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectEntry, ObjectIter, ObjectStore, ObjectValue, SyncCursor, Timestamp};
use foldsync_codec::Hash;
use parking_lot::RwLock;
use std::collections::HashMap;

/// An object store backed by a hash map.
///
/// Suitable for:
/// - Unit and integration tests
/// - The reference remote's per-repository pool
/// - Hosts without a writable filesystem
///
/// # Example
///
/// ```rust
/// use foldsync_codec::{compress, hash_object, ObjectKind};
/// use foldsync_storage::{MemoryObjectStore, ObjectStore};
///
/// let store = MemoryObjectStore::new();
/// let (hash, framed) = hash_object(ObjectKind::Blob, b"data");
/// store.put(&hash, &compress(&framed).unwrap()).unwrap();
/// assert!(store.has(&hash).unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<Hash, ObjectValue>>,
    cursor: RwLock<SyncCursor>,
}

impl MemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object with an explicit mtime. A no-op if already present.
    pub fn put_at(&self, hash: &Hash, compressed: &[u8], mtime: Timestamp) {
        self.objects
            .write()
            .entry(hash.clone())
            .or_insert_with(|| ObjectValue {
                content: compressed.to_vec(),
                mtime,
            });
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Newest mtime in the store, or the epoch when empty.
    #[must_use]
    pub fn newest(&self) -> Timestamp {
        self.objects
            .read()
            .values()
            .map(|v| v.mtime)
            .max()
            .unwrap_or(Timestamp::EPOCH)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn has(&self, hash: &Hash) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(hash))
    }

    fn get(&self, hash: &Hash) -> StorageResult<ObjectValue> {
        self.objects
            .read()
            .get(hash)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(hash.clone()))
    }

    fn put(&self, hash: &Hash, compressed: &[u8]) -> StorageResult<()> {
        self.put_at(hash, compressed, Timestamp::now());
        Ok(())
    }

    fn iterate(&self, since: Timestamp) -> StorageResult<ObjectIter<'_>> {
        // Snapshot so the iterator does not hold the lock.
        let entries: Vec<ObjectEntry> = self
            .objects
            .read()
            .iter()
            .filter(|(_, v)| v.mtime >= since)
            .map(|(hash, v)| ObjectEntry {
                hash: hash.clone(),
                content: v.content.clone(),
                mtime: v.mtime,
            })
            .collect();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }

    fn cursor(&self) -> StorageResult<SyncCursor> {
        Ok(*self.cursor.read())
    }

    fn set_cursor(&self, cursor: SyncCursor) -> StorageResult<()> {
        *self.cursor.write() = cursor;
        Ok(())
    }
}
