//! Object store that fetches missing objects from the remote.

use crate::transport::RemoteApi;
use foldsync_codec::{decode_tree, unpack_object, Hash, ObjectKind};
use foldsync_storage::{
    ObjectIter, ObjectStore, ObjectValue, StorageError, StorageResult, SyncCursor, Timestamp,
};
use std::sync::Arc;
use tracing::debug;

/// Decorates a local store with on-demand downloads.
///
/// `get` of an object missing locally downloads it. When it is a tree,
/// every entry not yet present locally is fetched in the same go with a
/// single batched request, so materializing a directory costs one round
/// trip instead of one per entry. Downloads are stored before `get`
/// returns. Everything else is served by the local store alone.
pub struct DownloadableObjectStore<S: ObjectStore> {
    local: S,
    remote: Arc<dyn RemoteApi>,
}

impl<S: ObjectStore> DownloadableObjectStore<S> {
    /// Wraps `local` with downloads from `remote`.
    pub fn new(local: S, remote: Arc<dyn RemoteApi>) -> Self {
        Self { local, remote }
    }

    /// The wrapped store.
    pub fn local(&self) -> &S {
        &self.local
    }

    fn fetch(&self, hashes: &[Hash]) -> StorageResult<Vec<foldsync_storage::ObjectEntry>> {
        self.remote
            .download(hashes)
            .map_err(|e| StorageError::Remote(e.to_string()))
    }

    fn prefetch_tree_entries(&self, compressed: &[u8]) -> StorageResult<()> {
        let (kind, content) = unpack_object(compressed)?;
        if kind != ObjectKind::Tree {
            return Ok(());
        }
        let mut missing = Vec::new();
        for entry in decode_tree(&content)? {
            if !self.local.has(&entry.hash)? {
                missing.push(entry.hash);
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        let fetched = self.fetch(&missing)?;
        debug!(requested = missing.len(), received = fetched.len(), "prefetched tree entries");
        for entry in fetched {
            self.local.put(&entry.hash, &entry.content)?;
        }
        Ok(())
    }
}

impl<S: ObjectStore> ObjectStore for DownloadableObjectStore<S> {
    fn has(&self, hash: &Hash) -> StorageResult<bool> {
        self.local.has(hash)
    }

    fn get(&self, hash: &Hash) -> StorageResult<ObjectValue> {
        if self.local.has(hash)? {
            return self.local.get(hash);
        }
        let first = self
            .fetch(std::slice::from_ref(hash))?
            .into_iter()
            .find(|e| &e.hash == hash)
            .ok_or_else(|| StorageError::NotFound(hash.clone()))?;
        debug!(%hash, "downloaded object");
        self.prefetch_tree_entries(&first.content)?;
        self.local.put(hash, &first.content)?;
        self.local.get(hash)
    }

    fn put(&self, hash: &Hash, compressed: &[u8]) -> StorageResult<()> {
        self.local.put(hash, compressed)
    }

    fn iterate(&self, since: Timestamp) -> StorageResult<ObjectIter<'_>> {
        self.local.iterate(since)
    }

    fn cursor(&self) -> StorageResult<SyncCursor> {
        self.local.cursor()
    }

    fn set_cursor(&self, cursor: SyncCursor) -> StorageResult<()> {
        self.local.set_cursor(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncResult;
    use crate::transport::Downloaded;
    use foldsync_codec::{compress, encode_tree, hash_object, FileName, TreeEntry};
    use foldsync_core::BranchName;
    use foldsync_storage::{MemoryObjectStore, ObjectEntry};
    use foldsync_sync_protocol::HeadUpdate;
    use parking_lot::Mutex;

    /// Serves objects from a map and counts download requests.
    #[derive(Default)]
    struct PoolRemote {
        pool: MemoryObjectStore,
        requests: Mutex<Vec<Vec<Hash>>>,
    }

    impl PoolRemote {
        fn add(&self, kind: ObjectKind, content: &[u8]) -> Hash {
            let (hash, framed) = hash_object(kind, content);
            self.pool.put(&hash, &compress(&framed).unwrap()).unwrap();
            hash
        }
    }

    impl RemoteApi for PoolRemote {
        fn repo_id(&self) -> &str {
            "pool"
        }
        fn get_head(&self, _: &BranchName) -> SyncResult<Option<Hash>> {
            Ok(None)
        }
        fn set_head(&self, _: &BranchName, _: Option<&Hash>, _: &Hash) -> SyncResult<HeadUpdate> {
            Ok(HeadUpdate::Applied)
        }
        fn upload(&self, _: &[ObjectEntry]) -> SyncResult<Timestamp> {
            Ok(Timestamp::now())
        }
        fn download_since(&self, _: Timestamp) -> SyncResult<Downloaded> {
            Ok(Downloaded::default())
        }
        fn download(&self, hashes: &[Hash]) -> SyncResult<Vec<ObjectEntry>> {
            self.requests.lock().push(hashes.to_vec());
            Ok(hashes
                .iter()
                .filter_map(|h| {
                    self.pool.get(h).ok().map(|v| ObjectEntry {
                        hash: h.clone(),
                        content: v.content,
                        mtime: v.mtime,
                    })
                })
                .collect())
        }
    }

    fn name(s: &str) -> FileName {
        FileName::parse(s).unwrap()
    }

    #[test]
    fn tree_entries_are_fetched_in_one_batch() {
        let remote = Arc::new(PoolRemote::default());
        let a = remote.add(ObjectKind::Blob, b"a");
        let b = remote.add(ObjectKind::Blob, b"b");
        let c = remote.add(ObjectKind::Blob, b"c");
        let tree = remote.add(
            ObjectKind::Tree,
            &encode_tree(&[
                TreeEntry::file(name("a"), a.clone()),
                TreeEntry::file(name("b"), b.clone()),
                TreeEntry::file(name("c"), c.clone()),
            ]),
        );

        let local = MemoryObjectStore::new();
        // already local, must not be requested again
        local
            .put(&a, &remote.pool.get(&a).unwrap().content)
            .unwrap();
        let store = DownloadableObjectStore::new(local, remote.clone());

        store.get(&tree).unwrap();
        let requests = remote.requests.lock().clone();
        assert_eq!(requests, vec![vec![tree.clone()], vec![b.clone(), c.clone()]]);
        for hash in [&tree, &a, &b, &c] {
            assert!(store.has(hash).unwrap());
        }

        // served locally from now on
        store.get(&b).unwrap();
        assert_eq!(remote.requests.lock().len(), 2);
    }

    #[test]
    fn blobs_do_not_prefetch() {
        let remote = Arc::new(PoolRemote::default());
        let blob = remote.add(ObjectKind::Blob, b"just a blob");
        let store = DownloadableObjectStore::new(MemoryObjectStore::new(), remote.clone());
        assert_eq!(store.get(&blob).unwrap().content, remote.pool.get(&blob).unwrap().content);
        assert_eq!(remote.requests.lock().len(), 1);
    }

    #[test]
    fn missing_everywhere_is_not_found() {
        let remote = Arc::new(PoolRemote::default());
        let store = DownloadableObjectStore::new(MemoryObjectStore::new(), remote);
        let err = store.get(&foldsync_codec::hash_bytes(b"nowhere")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn has_and_iterate_are_local_only() {
        let remote = Arc::new(PoolRemote::default());
        let blob = remote.add(ObjectKind::Blob, b"remote only");
        let store = DownloadableObjectStore::new(MemoryObjectStore::new(), remote.clone());
        assert!(!store.has(&blob).unwrap());
        assert_eq!(store.iterate(Timestamp::EPOCH).unwrap().count(), 0);
        assert!(remote.requests.lock().is_empty());
    }
}
