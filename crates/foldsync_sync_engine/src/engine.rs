//! The sync engine: commit, push, pull and merge against one remote.

use crate::config::SyncConfig;
use crate::downloadable::DownloadableObjectStore;
use crate::error::{SyncError, SyncResult};
use crate::transport::{RemoteApi, RemoteConnector};
use foldsync_codec::{Author, CommitEntry, FileName, Hash, TreeEntry};
use foldsync_core::{
    generate_api_key, same_except_crlf, BranchName, Conflict, CoreError, GitObject, PathInRepo,
    RefName, RepoConfig, RepoDir, RepoLayout, Repository,
};
use foldsync_storage::{FileObjectStore, ObjectEntry, StorageResult, SyncCursor, Timestamp};
use foldsync_sync_protocol::HeadUpdate;
use parking_lot::RwLock;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Outcome of one sync round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// The branch did not exist remotely and was created.
    NewlyPushed,
    /// Local and remote heads were already equal.
    NoChanges,
    /// Local commits were pushed.
    Pushed,
    /// The working copy was fast-forwarded to the remote head.
    Pulled,
    /// Diverged histories were merged without conflicts.
    ///
    /// The merge commit exists locally only; another round pushes it.
    AutoMerged,
    /// The remote head changed between reading and swapping it.
    HeadMoved {
        /// Head the remote reported.
        actual: Hash,
    },
    /// The merge left conflicts on disk. MERGE_HEAD stays set.
    Conflicted {
        /// Files written next to the conflicting originals.
        paths: Vec<PathInRepo>,
    },
}

impl SyncStatus {
    /// Returns true if another round is needed to settle.
    #[must_use]
    pub fn needs_another_round(&self) -> bool {
        matches!(self, Self::AutoMerged | Self::HeadMoved { .. })
    }

    /// Returns true if the merge stopped on conflicts.
    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewlyPushed => f.write_str("newly_pushed"),
            Self::NoChanges => f.write_str("no_changes"),
            Self::Pushed => f.write_str("pushed"),
            Self::Pulled => f.write_str("pulled"),
            Self::AutoMerged => f.write_str("auto_merged"),
            Self::HeadMoved { .. } => f.write_str("head_moved"),
            Self::Conflicted { .. } => f.write_str("conflicted"),
        }
    }
}

/// How a file changed on both sides of a merge is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Keep the local file and save the remote version next to it as
    /// `name(<remote head prefix>).ext`. The conflict stays unresolved.
    #[default]
    SaveHashedRemote,
    /// Take the remote version.
    IgnoreLocal,
    /// Keep the local version.
    IgnoreRemote,
    /// Take the remote version if its commit is newer than the local file.
    Newer,
}

/// What `clone` does when the target directory is not empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowNonEmpty {
    /// Set up the working copy but leave existing files alone.
    SkipCheckout,
    /// Check out over existing files.
    Overwrite,
}

/// Options for cloning a remote repository.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Branch to clone. Defaults to the configured branch.
    pub branch: Option<BranchName>,
    /// Permission to clone into a non-empty directory.
    pub allow_non_empty: Option<AllowNonEmpty>,
}

impl CloneOptions {
    /// Clones the given branch.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchName) -> Self {
        self.branch = Some(branch);
        self
    }

    /// Allows a non-empty target directory.
    #[must_use]
    pub fn allow_non_empty(mut self, mode: AllowNonEmpty) -> Self {
        self.allow_non_empty = Some(mode);
        self
    }
}

/// Counters over the lifetime of an engine.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync rounds completed.
    pub rounds: u64,
    /// Commits created.
    pub commits: u64,
    /// Objects sent to the remote.
    pub objects_uploaded: u64,
    /// Rounds that ended in a lost head race.
    pub head_races: u64,
    /// Status of the last completed round.
    pub last_status: Option<SyncStatus>,
}

/// One entry of [`SyncEngine::log`].
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Commit hash.
    pub hash: Hash,
    /// Decoded commit.
    pub commit: CommitEntry,
}

impl LogEntry {
    /// Second parent of a merge commit. It is not followed by the log.
    #[must_use]
    pub fn merged_parent(&self) -> Option<&Hash> {
        self.commit.parents.get(1)
    }
}

/// Synchronizes one working copy with one remote.
pub struct SyncEngine {
    config: SyncConfig,
    repo: Repository,
    remote: Arc<dyn RemoteApi>,
    stats: RwLock<SyncStats>,
    _dir: Option<RepoDir>,
}

impl fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncEngine")
            .field("work_dir", &self.repo.work_dir())
            .field("remote", &self.remote.repo_id())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine from parts. No lock is taken.
    pub fn new(config: SyncConfig, repo: Repository, remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            config,
            repo,
            remote,
            stats: RwLock::new(SyncStats::default()),
            _dir: None,
        }
    }

    fn from_dir(dir: RepoDir, config: SyncConfig, remote: Arc<dyn RemoteApi>) -> SyncResult<Self> {
        let local = FileObjectStore::open(dir.layout().meta_dir())?;
        let store = DownloadableObjectStore::new(local, Arc::clone(&remote));
        let repo = Repository::new(dir.layout().clone(), Arc::new(store));
        Ok(Self {
            config,
            repo,
            remote,
            stats: RwLock::new(SyncStats::default()),
            _dir: Some(dir),
        })
    }

    /// Creates a repository on the server and a working copy for it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if `work_dir` already holds a
    /// working copy.
    pub fn init(
        work_dir: &Path,
        server_url: &str,
        config: SyncConfig,
        connector: &dyn RemoteConnector,
    ) -> SyncResult<Self> {
        let layout = RepoLayout::new(work_dir, &config.meta_dir);
        if layout.exists() {
            return Err(CoreError::AlreadyExists(layout.meta_dir().to_path_buf()).into());
        }
        if !server_url.ends_with(".php") && !server_url.ends_with('/') {
            warn!(server_url, "server URL usually ends with '.php' or '/'");
        }

        let api_key = generate_api_key();
        let repo_id = connector.create_repository(server_url, &api_key)?;
        let repo_config = RepoConfig::new(server_url, repo_id.as_str()).with_api_key(api_key);

        fs::create_dir_all(work_dir)?;
        let dir = RepoDir::create(layout)?;
        dir.layout().save_config(&repo_config)?;
        let remote = connector.connect(&repo_config)?;
        let engine = Self::from_dir(dir, config, remote)?;
        engine.repo.set_current_branch(&engine.config.branch)?;
        info!(%repo_id, work_dir = %work_dir.display(), "initialized working copy");
        Ok(engine)
    }

    /// Creates a working copy of an existing remote repository.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotEmpty`] if `target` has files and no
    /// [`AllowNonEmpty`] mode was given, and
    /// [`SyncError::RemoteHeadMissing`] if the branch does not exist.
    pub fn clone_remote(
        target: &Path,
        server_url: &str,
        repo_id: &str,
        config: SyncConfig,
        options: CloneOptions,
        connector: &dyn RemoteConnector,
    ) -> SyncResult<Self> {
        let non_empty = target.is_dir() && fs::read_dir(target)?.next().is_some();
        let checkout = match (non_empty, options.allow_non_empty) {
            (false, _) | (true, Some(AllowNonEmpty::Overwrite)) => true,
            (true, Some(AllowNonEmpty::SkipCheckout)) => false,
            (true, None) => return Err(SyncError::NotEmpty(target.to_path_buf())),
        };

        fs::create_dir_all(target)?;
        let dir = RepoDir::create(RepoLayout::new(target, &config.meta_dir))?;
        let repo_config = RepoConfig::new(server_url, repo_id);
        dir.layout().save_config(&repo_config)?;
        let remote = connector.connect(&repo_config)?;
        let engine = Self::from_dir(dir, config, remote)?;

        let branch = options
            .branch
            .unwrap_or_else(|| engine.config.branch.clone());
        let head = engine
            .remote
            .get_head(&branch)?
            .ok_or_else(|| SyncError::RemoteHeadMissing {
                branch: branch.to_string(),
            })?;
        engine.repo.update_head(&RefName::local(&branch), &head)?;
        if checkout {
            let commit = engine.repo.read_commit(&head)?;
            engine.repo.checkout(&commit.tree, target)?;
        }
        engine.repo.set_current_branch(&branch)?;
        info!(%repo_id, %branch, head = %head.short(8), checkout, "cloned");
        Ok(engine)
    }

    /// Opens the working copy containing `start` and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Locked`] if another engine holds the working
    /// copy.
    pub fn open(
        start: &Path,
        config: SyncConfig,
        connector: &dyn RemoteConnector,
    ) -> SyncResult<Self> {
        let dir = RepoDir::open(RepoLayout::find(start, &config.meta_dir)?)?;
        let repo_config = dir.layout().load_config()?;
        let remote = connector.connect(&repo_config)?;
        Self::from_dir(dir, config, remote)
    }

    /// The working copy.
    #[must_use]
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// The remote this engine syncs with.
    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.remote
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Current branch. Points HEAD at the configured branch if unset.
    pub fn branch(&self) -> SyncResult<BranchName> {
        if !self.repo.has_head_file() {
            self.repo.set_current_branch(&self.config.branch)?;
        }
        Ok(self.repo.current_branch()?)
    }

    /// Snapshots the working directory onto the current branch.
    ///
    /// Returns the current head unchanged when the tree did not change and
    /// no merge is in progress. A pending MERGE_HEAD becomes the second
    /// parent and is cleared.
    pub fn commit(&self) -> SyncResult<Hash> {
        let branch = self.branch()?;
        let head_ref = RefName::local(&branch);
        let entries = self.repo.build_working_tree()?;
        let tree = self.repo.write_tree(&entries)?;
        let current = self.repo.read_head(&head_ref)?;
        let merge_head = self.repo.read_merge_head()?;

        if let (Some(current), None) = (&current, &merge_head) {
            if self.repo.read_commit(current)?.tree == tree {
                debug!(%branch, "working tree unchanged");
                return Ok(current.clone());
            }
        }

        let author = Author::now(&self.config.author_name, &self.config.author_email);
        let commit = CommitEntry {
            tree,
            parents: current.into_iter().chain(merge_head.clone()).collect(),
            message: author.date.to_rfc2822(),
            committer: author.clone(),
            author,
        };
        let hash = self.repo.write_commit(&commit)?;
        self.repo.update_head(&head_ref, &hash)?;
        if merge_head.is_some() {
            self.repo.write_merge_head(None)?;
        }
        self.stats.write().commits += 1;
        info!(%branch, commit = %hash.short(8), parents = commit.parents.len(), "committed");
        Ok(hash)
    }

    /// Sends every object stored since the last upload.
    ///
    /// The cursor only advances once all batches went through. Returns
    /// the number of objects sent.
    pub fn upload(&self) -> SyncResult<usize> {
        let store = self.repo.store();
        let since = store.cursor()?.upload_since;
        let started = Timestamp::now();
        let objects = store.iterate(since)?.collect::<StorageResult<Vec<ObjectEntry>>>()?;
        if objects.is_empty() {
            debug!(since = since.as_secs(), "nothing to upload");
            return Ok(0);
        }
        for batch in objects.chunks(self.config.upload_batch_size) {
            self.remote.upload(batch)?;
        }
        store.set_cursor(SyncCursor {
            upload_since: started,
        })?;
        self.stats.write().objects_uploaded += objects.len() as u64;
        info!(count = objects.len(), "uploaded objects");
        Ok(objects.len())
    }

    /// Runs one sync round.
    pub fn sync(&self, policy: ConflictPolicy) -> SyncResult<SyncStatus> {
        let local = self.commit()?;
        let branch = self.branch()?;

        let status = match self.remote.get_head(&branch)? {
            None => {
                self.upload()?;
                self.publish(&branch, None, &local, SyncStatus::NewlyPushed)?
            }
            Some(remote) if remote == local => SyncStatus::NoChanges,
            Some(remote) => {
                let base = self.repo.find_merge_base(&local, &remote)?;
                if base == remote {
                    self.upload()?;
                    self.publish(&branch, Some(&remote), &local, SyncStatus::Pushed)?
                } else if base == local {
                    self.fast_forward(&branch, &local, &remote)?;
                    SyncStatus::Pulled
                } else {
                    self.merge(&base, &local, &remote, policy)?
                }
            }
        };

        let mut stats = self.stats.write();
        stats.rounds += 1;
        if matches!(status, SyncStatus::HeadMoved { .. }) {
            stats.head_races += 1;
        }
        stats.last_status = Some(status.clone());
        drop(stats);

        info!(%branch, %status, "sync round finished");
        Ok(status)
    }

    /// Syncs until the result settles or the round budget runs out.
    ///
    /// Auto-merges, lost head races and retryable transport failures
    /// trigger another round. The final
    /// status is [`SyncStatus::AutoMerged`] if any round merged, even when
    /// a later round stopped on conflicts; [`SyncEngine::stats`] keeps the
    /// last round's status with the conflict paths.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RetryExhausted`] if no round settled, or the
    /// error of the last round if that one failed.
    pub fn sync_with_retry(&self, policy: ConflictPolicy) -> SyncResult<SyncStatus> {
        let rounds = self.config.max_sync_rounds;
        let mut merged = false;
        for round in 1..=rounds {
            let status = match self.sync(policy) {
                Ok(status) => status,
                Err(e) if e.is_retryable() && round < rounds => {
                    warn!(round, error = %e, "sync round failed, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if status.needs_another_round() {
                match &status {
                    SyncStatus::HeadMoved { actual } => {
                        debug!(round, actual = %actual.short(8), "remote head moved, retrying");
                    }
                    _ => merged = true,
                }
                continue;
            }
            if !merged {
                return Ok(status);
            }
            if status.is_conflicted() {
                warn!(round, "conflicts remain after merging");
            }
            return Ok(SyncStatus::AutoMerged);
        }
        warn!(rounds, "sync did not settle");
        Err(SyncError::RetryExhausted { rounds })
    }

    /// First-parent history of the current branch, newest first.
    pub fn log(&self) -> SyncResult<Vec<LogEntry>> {
        let branch = self.branch()?;
        let Some(head) = self.repo.read_head(&RefName::local(&branch))? else {
            return Ok(Vec::new());
        };
        self.repo
            .history(&head)
            .map(|item| {
                let (hash, commit) = item?;
                Ok(LogEntry { hash, commit })
            })
            .collect()
    }

    /// Reads any object, downloading it if needed.
    pub fn cat_file(&self, hash: &Hash) -> SyncResult<GitObject> {
        Ok(self.repo.read_object(hash)?)
    }

    fn publish(
        &self,
        branch: &BranchName,
        current: Option<&Hash>,
        next: &Hash,
        success: SyncStatus,
    ) -> SyncResult<SyncStatus> {
        match self.remote.set_head(branch, current, next)? {
            HeadUpdate::Applied => Ok(success),
            HeadUpdate::Rejected { actual } => {
                info!(%branch, actual = %actual.short(8), "remote head moved");
                Ok(SyncStatus::HeadMoved { actual })
            }
        }
    }

    fn fast_forward(&self, branch: &BranchName, local: &Hash, remote: &Hash) -> SyncResult<()> {
        let from = self.commit_tree(local)?;
        let to = self.commit_tree(remote)?;
        let changes = self.repo.diff_tree(&from, &to)?;
        debug!(changes = changes.len(), "applying remote changes");
        self.repo.apply_diff(&changes)?;
        self.repo.update_head(&RefName::local(branch), remote)?;
        Ok(())
    }

    fn merge(
        &self,
        base: &Hash,
        local: &Hash,
        remote: &Hash,
        policy: ConflictPolicy,
    ) -> SyncResult<SyncStatus> {
        let outcome = self.repo.three_way_merge(
            &self.commit_tree(base)?,
            &self.commit_tree(local)?,
            &self.commit_tree(remote)?,
        )?;
        self.repo.write_merge_head(Some(remote))?;
        self.repo.apply_diff(&outcome.to_a)?;

        let unresolved = self.resolve_conflicts(&outcome.conflicts, remote, policy)?;
        if !unresolved.is_empty() {
            warn!(count = unresolved.len(), "merge left conflicts");
            return Ok(SyncStatus::Conflicted { paths: unresolved });
        }
        self.commit()?;
        Ok(SyncStatus::AutoMerged)
    }

    fn resolve_conflicts(
        &self,
        conflicts: &[Conflict],
        remote_head: &Hash,
        policy: ConflictPolicy,
    ) -> SyncResult<Vec<PathInRepo>> {
        let mut unresolved = Vec::new();
        if conflicts.is_empty() {
            return Ok(unresolved);
        }
        let remote_time = SystemTime::from(self.repo.read_commit(remote_head)?.author.date);
        let work_dir = self.repo.work_dir();

        for conflict in conflicts {
            let target = conflict.path.to_fs_path(work_dir);
            let remote = self.repo.read_blob(&conflict.b)?;
            let local = match fs::read(&target) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.repo.write_file_if_changed(&target, &remote)?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if same_except_crlf(&local, &remote) {
                debug!(path = %conflict.path, "sides differ only in line endings");
                continue;
            }
            match policy {
                ConflictPolicy::IgnoreLocal => {
                    self.repo.write_file_if_changed(&target, &remote)?;
                }
                ConflictPolicy::IgnoreRemote => {}
                ConflictPolicy::Newer => {
                    if remote_time > fs::metadata(&target)?.modified()? {
                        self.repo.write_file_if_changed(&target, &remote)?;
                    }
                }
                ConflictPolicy::SaveHashedRemote => {
                    let copy = conflict_copy_path(&conflict.path, remote_head)?;
                    self.repo
                        .write_file_if_changed(&copy.to_fs_path(work_dir), &remote)?;
                    warn!(path = %conflict.path, remote_copy = %copy, "conflict");
                    unresolved.push(copy);
                }
            }
        }
        Ok(unresolved)
    }

    fn commit_tree(&self, commit: &Hash) -> SyncResult<Vec<TreeEntry>> {
        let tree = self.repo.read_commit(commit)?.tree;
        Ok(self.repo.read_tree(&tree)?)
    }
}

/// Path the remote side of a conflict is saved under.
///
/// `notes.txt` becomes `notes(1a2b3c4d).txt` for a remote head starting
/// with `1a2b3c4d`. A leading dot does not start an extension.
pub fn conflict_copy_path(path: &PathInRepo, remote_head: &Hash) -> SyncResult<PathInRepo> {
    let name = path.file_name().unwrap_or_default();
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    };
    let copy = FileName::parse(format!("{stem}({}){ext}", remote_head.short(8)))?;
    Ok(path.parent().unwrap_or_else(PathInRepo::root).join(&copy))
}
