//! The remote API seen by the engine.

use crate::error::SyncResult;
use foldsync_codec::Hash;
use foldsync_core::{BranchName, RepoConfig};
use foldsync_storage::{ObjectEntry, Timestamp};
use foldsync_sync_protocol::HeadUpdate;
use std::sync::Arc;

/// Objects returned by [`RemoteApi::download_since`].
#[derive(Debug, Clone, Default)]
pub struct Downloaded {
    /// Objects stored on the remote at or after the requested time.
    pub objects: Vec<ObjectEntry>,
    /// Remote time of the reply.
    pub newest: Timestamp,
}

/// Operations on one remote repository.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait RemoteApi: Send + Sync {
    /// Identifier of the remote repository.
    fn repo_id(&self) -> &str;

    /// Current head of `branch`, `None` if the branch does not exist.
    fn get_head(&self, branch: &BranchName) -> SyncResult<Option<Hash>>;

    /// Compare-and-swap of a branch head.
    ///
    /// `current == None` creates the branch. A head that moved in the
    /// meantime yields [`HeadUpdate::Rejected`], not an error.
    fn set_head(
        &self,
        branch: &BranchName,
        current: Option<&Hash>,
        next: &Hash,
    ) -> SyncResult<HeadUpdate>;

    /// Stores objects remotely. Returns the remote's timestamp.
    fn upload(&self, objects: &[ObjectEntry]) -> SyncResult<Timestamp>;

    /// Fetches objects stored at or after `since`.
    fn download_since(&self, since: Timestamp) -> SyncResult<Downloaded>;

    /// Fetches specific objects. Unknown hashes are silently absent.
    fn download(&self, hashes: &[Hash]) -> SyncResult<Vec<ObjectEntry>>;
}

impl<T: RemoteApi + ?Sized> RemoteApi for Arc<T> {
    fn repo_id(&self) -> &str {
        (**self).repo_id()
    }

    fn get_head(&self, branch: &BranchName) -> SyncResult<Option<Hash>> {
        (**self).get_head(branch)
    }

    fn set_head(
        &self,
        branch: &BranchName,
        current: Option<&Hash>,
        next: &Hash,
    ) -> SyncResult<HeadUpdate> {
        (**self).set_head(branch, current, next)
    }

    fn upload(&self, objects: &[ObjectEntry]) -> SyncResult<Timestamp> {
        (**self).upload(objects)
    }

    fn download_since(&self, since: Timestamp) -> SyncResult<Downloaded> {
        (**self).download_since(since)
    }

    fn download(&self, hashes: &[Hash]) -> SyncResult<Vec<ObjectEntry>> {
        (**self).download(hashes)
    }
}

/// Creates and opens remote repositories.
///
/// Passed explicitly into `init`, `clone` and `open`; there is no global
/// registry of remotes.
pub trait RemoteConnector: Send + Sync {
    /// Creates a repository on the remote at `server_url`. Returns its id.
    fn create_repository(&self, server_url: &str, api_key: &str) -> SyncResult<String>;

    /// Opens the repository described by `config`.
    fn connect(&self, config: &RepoConfig) -> SyncResult<Arc<dyn RemoteApi>>;
}
