//! Working copy directory management.
//!
//! A working copy is any directory holding a metadata directory
//! (`.foldsync` by default):
//!
//! ```text
//! <work_dir>/
//! ├─ ...user files...
//! └─ .foldsync/
//!    ├─ HEAD            # "ref: refs/heads/<branch>\n"
//!    ├─ MERGE_HEAD      # present only while a merge is in progress
//!    ├─ LOCK            # advisory lock for single-writer
//!    ├─ remote.json     # RepoConfig
//!    ├─ state.json      # sync cursor, owned by the object store
//!    ├─ objects/<2>/<38>
//!    └─ refs/heads/<branch>
//! ```

use crate::config::RepoConfig;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default metadata directory name.
pub const DEFAULT_META_DIR: &str = ".foldsync";

const LOCK_FILE: &str = "LOCK";
const CONFIG_FILE: &str = "remote.json";
const CONFIG_TEMP: &str = "remote.json.tmp";
const HEAD_FILE: &str = "HEAD";
const MERGE_HEAD_FILE: &str = "MERGE_HEAD";

/// Paths of a working copy. Cheap to clone; holds no handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLayout {
    work_dir: PathBuf,
    meta_dir: PathBuf,
}

impl RepoLayout {
    /// Layout for `work_dir` with the given metadata directory name.
    pub fn new(work_dir: impl Into<PathBuf>, meta_name: &str) -> Self {
        let work_dir = work_dir.into();
        let meta_dir = work_dir.join(meta_name);
        Self { work_dir, meta_dir }
    }

    /// Walks up from `start` until a directory containing `meta_name` is found.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotARepository`] if no ancestor qualifies.
    pub fn find(start: &Path, meta_name: &str) -> CoreResult<Self> {
        let start = start.canonicalize()?;
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            if dir.join(meta_name).is_dir() {
                return Ok(Self::new(dir, meta_name));
            }
            current = dir.parent();
        }
        Err(CoreError::NotARepository(start))
    }

    /// Root of the user's files.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// The metadata directory.
    #[must_use]
    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    /// Name of the metadata directory.
    #[must_use]
    pub fn meta_name(&self) -> &str {
        self.meta_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_META_DIR)
    }

    /// Path of the HEAD file.
    #[must_use]
    pub fn head_path(&self) -> PathBuf {
        self.meta_dir.join(HEAD_FILE)
    }

    /// Path of the MERGE_HEAD file.
    #[must_use]
    pub fn merge_head_path(&self) -> PathBuf {
        self.meta_dir.join(MERGE_HEAD_FILE)
    }

    /// Path of the remote config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.meta_dir.join(CONFIG_FILE)
    }

    /// Returns true once the metadata directory exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.meta_dir.is_dir()
    }

    /// Loads the remote config, generating and saving an api key if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load_config(&self) -> CoreResult<RepoConfig> {
        let bytes = fs::read(self.config_path())?;
        let mut config: RepoConfig = serde_json::from_slice(&bytes)?;
        if config.ensure_api_key() {
            self.save_config(&config)?;
        }
        Ok(config)
    }

    /// Saves the remote config using write-then-rename.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_config(&self, config: &RepoConfig) -> CoreResult<()> {
        let temp = self.meta_dir.join(CONFIG_TEMP);
        let mut file = File::create(&temp)?;
        file.write_all(&serde_json::to_vec(config)?)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, self.config_path())?;
        Ok(())
    }
}

/// An opened working copy holding the exclusive lock.
///
/// Only one `RepoDir` can exist per working copy at a time, across
/// processes. The lock is released on drop.
#[derive(Debug)]
pub struct RepoDir {
    layout: RepoLayout,
    _lock_file: File,
}

impl RepoDir {
    /// Creates the metadata directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyExists`] if the metadata directory is
    /// already there.
    pub fn create(layout: RepoLayout) -> CoreResult<Self> {
        if layout.exists() {
            return Err(CoreError::AlreadyExists(layout.meta_dir().to_path_buf()));
        }
        fs::create_dir_all(layout.meta_dir())?;
        Self::open(layout)
    }

    /// Locks an existing metadata directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The metadata directory does not exist
    /// - Another process holds the lock (returns `Locked`)
    pub fn open(layout: RepoLayout) -> CoreResult<Self> {
        if !layout.exists() {
            return Err(CoreError::NotARepository(layout.work_dir().to_path_buf()));
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(layout.meta_dir().join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::Locked);
        }
        Ok(Self {
            layout,
            _lock_file: lock_file,
        })
    }

    /// Paths of this working copy.
    #[must_use]
    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }
}
