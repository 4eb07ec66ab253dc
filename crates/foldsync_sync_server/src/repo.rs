//! One hosted repository: an object pool plus branch heads.

use foldsync_codec::Hash;
use foldsync_storage::MemoryObjectStore;
use parking_lot::RwLock;
use std::collections::HashMap;

/// State of a hosted repository.
#[derive(Debug, Default)]
pub struct HostedRepo {
    objects: MemoryObjectStore,
    heads: RwLock<HashMap<String, Hash>>,
}

impl HostedRepo {
    /// An empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The object pool.
    #[must_use]
    pub fn objects(&self) -> &MemoryObjectStore {
        &self.objects
    }

    /// Head of `branch`, if set.
    #[must_use]
    pub fn head(&self, branch: &str) -> Option<Hash> {
        self.heads.read().get(branch).cloned()
    }

    /// Compare-and-swap of a branch head.
    ///
    /// With `current == None` the head is created only if absent. With a
    /// value, the head moves only if it currently holds that value, so a
    /// branch without a head refuses it. On refusal the head actually found
    /// is returned, `None` when the branch has none.
    pub fn swap_head(
        &self,
        branch: &str,
        current: Option<&Hash>,
        next: Hash,
    ) -> Result<(), Option<Hash>> {
        let mut heads = self.heads.write();
        let existing = heads.get(branch);
        if current != existing {
            return Err(existing.cloned());
        }
        heads.insert(branch.to_string(), next);
        Ok(())
    }

    /// Overwrites a head without any check.
    pub fn force_head(&self, branch: &str, hash: Hash) {
        self.heads.write().insert(branch.to_string(), hash);
    }

    /// Number of branches with a head.
    #[must_use]
    pub fn branch_count(&self) -> usize {
        self.heads.read().len()
    }
}
