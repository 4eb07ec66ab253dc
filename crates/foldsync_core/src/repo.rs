//! The repository: typed access to the object store plus the working tree.

use crate::dir::RepoLayout;
use crate::error::{CoreError, CoreResult};
use crate::ignore::{IgnoreChecker, IgnoreRules, IgnoreStack};
use crate::text::{normalize_line_endings, same_except_crlf};
use crate::types::PathInRepo;
use foldsync_codec::{
    compress, decode_commit, decode_tree, encode_commit, encode_tree, hash_object, sort_entries,
    unpack_object, CommitEntry, FileName, Hash, ObjectKind, TreeEntry,
};
use foldsync_storage::ObjectStore;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// A decoded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitObject {
    /// Type from the header.
    pub kind: ObjectKind,
    /// Uncompressed content without the header.
    pub content: Vec<u8>,
}

/// A working copy bound to an object store.
///
/// The repository is the only component that reads or writes the user's
/// files and the ref files under the metadata directory.
pub struct Repository {
    pub(crate) layout: RepoLayout,
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Repository {
    /// Binds a working copy layout to an object store.
    #[must_use]
    pub fn new(layout: RepoLayout, store: Arc<dyn ObjectStore>) -> Self {
        Self { layout, store }
    }

    /// Paths of the working copy.
    #[must_use]
    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    /// Root of the user's files.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        self.layout.work_dir()
    }

    /// The backing object store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    // ---- objects ----

    /// Frames, hashes and stores an object unless already present.
    pub fn write_object(&self, kind: ObjectKind, content: &[u8]) -> CoreResult<Hash> {
        let (hash, framed) = hash_object(kind, content);
        if !self.store.has(&hash)? {
            self.store.put(&hash, &compress(&framed)?)?;
        }
        Ok(hash)
    }

    /// Stores file content.
    pub fn write_blob(&self, content: &[u8]) -> CoreResult<Hash> {
        self.write_object(ObjectKind::Blob, content)
    }

    /// Stores a directory listing in the given entry order.
    pub fn write_tree(&self, entries: &[TreeEntry]) -> CoreResult<Hash> {
        self.write_object(ObjectKind::Tree, &encode_tree(entries))
    }

    /// Stores a commit.
    pub fn write_commit(&self, entry: &CommitEntry) -> CoreResult<Hash> {
        self.write_object(ObjectKind::Commit, &encode_commit(entry))
    }

    /// Reads and decodes any object.
    pub fn read_object(&self, hash: &Hash) -> CoreResult<GitObject> {
        let stored = self.store.get(hash)?;
        let (kind, content) = unpack_object(&stored.content)?;
        Ok(GitObject { kind, content })
    }

    fn read_expecting(&self, hash: &Hash, expected: ObjectKind) -> CoreResult<Vec<u8>> {
        let object = self.read_object(hash)?;
        if object.kind != expected {
            return Err(CoreError::UnexpectedKind {
                hash: hash.clone(),
                expected,
                actual: object.kind,
            });
        }
        Ok(object.content)
    }

    /// Reads file content.
    pub fn read_blob(&self, hash: &Hash) -> CoreResult<Vec<u8>> {
        self.read_expecting(hash, ObjectKind::Blob)
    }

    /// Reads a directory listing.
    pub fn read_tree(&self, hash: &Hash) -> CoreResult<Vec<TreeEntry>> {
        Ok(decode_tree(&self.read_expecting(hash, ObjectKind::Tree)?)?)
    }

    /// Reads a commit.
    pub fn read_commit(&self, hash: &Hash) -> CoreResult<CommitEntry> {
        Ok(decode_commit(&self.read_expecting(hash, ObjectKind::Commit)?)?)
    }

    // ---- working tree ----

    /// Snapshots the working directory into blob and tree objects.
    ///
    /// Ignored paths, the metadata directory, `.git` and nested working
    /// copies are skipped. Entries are sorted by name and empty directories
    /// are left out, so equal contents always yield the same root tree.
    /// Returns the root entries; pass them to [`Repository::write_tree`].
    pub fn build_working_tree(&self) -> CoreResult<Vec<TreeEntry>> {
        let builtin = IgnoreRules::builtin(self.layout.meta_name());
        self.snapshot_dir(self.work_dir(), &PathInRepo::root(), &IgnoreStack::new(), &builtin)
    }

    fn snapshot_dir(
        &self,
        dir: &Path,
        rel: &PathInRepo,
        parent_rules: &IgnoreStack,
        builtin: &IgnoreRules,
    ) -> CoreResult<Vec<TreeEntry>> {
        let rules = parent_rules.pushed(dir);
        let mut listing: Vec<fs::DirEntry> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
        listing.sort_by_key(|e| e.file_name());

        let mut entries = Vec::new();
        for item in listing {
            let os_name = item.file_name();
            let Some(name) = os_name.to_str().and_then(|n| FileName::parse(n).ok()) else {
                warn!(path = %item.path().display(), "skipping file with unsupported name");
                continue;
            };
            let file_type = item.file_type()?;
            let is_dir = file_type.is_dir();
            let child_rel = rel.join(&name);
            let full = item.path();

            if builtin.ignores(child_rel.as_str(), is_dir) || rules.ignores(&full, is_dir) {
                continue;
            }

            if file_type.is_file() {
                let raw = fs::read(&full)?;
                let hash = self.write_blob(&normalize_line_endings(&raw))?;
                entries.push(TreeEntry::file(name, hash));
            } else if is_dir {
                if self.is_nested_repo(&full) {
                    debug!(path = %child_rel, "skipping nested working copy");
                    continue;
                }
                let children = self.snapshot_dir(&full, &child_rel, &rules, builtin)?;
                if children.is_empty() {
                    continue;
                }
                let hash = self.write_tree(&children)?;
                entries.push(TreeEntry::directory(name, hash));
            }
        }
        sort_entries(&mut entries);
        Ok(entries)
    }

    /// Returns true if `dir` is the root of another working copy.
    #[must_use]
    pub fn is_nested_repo(&self, dir: &Path) -> bool {
        dir != self.work_dir() && dir.join(self.layout.meta_name()).is_dir()
    }

    /// Returns true if `path` lies inside a nested working copy.
    #[must_use]
    pub fn in_nested_repo(&self, path: &PathInRepo) -> bool {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                return false;
            }
            if self.is_nested_repo(&dir.to_fs_path(self.work_dir())) {
                return true;
            }
            current = dir.parent();
        }
        false
    }

    /// Materializes a tree into `dest`, creating directories as needed.
    pub fn checkout(&self, tree: &Hash, dest: &Path) -> CoreResult<()> {
        fs::create_dir_all(dest)?;
        for item in self.walk_tree(tree)? {
            let (path, entry) = item?;
            let target = path.to_fs_path(dest);
            if entry.mode.is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::write(&target, self.read_blob(&entry.hash)?)?;
            }
        }
        Ok(())
    }

    /// Applies diff entries to the working directory.
    ///
    /// Ignored paths and paths inside nested working copies are skipped.
    /// Deleting an absent file is not an error. Writes are skipped when the
    /// file on disk already matches modulo CRLF line endings.
    pub fn apply_diff(&self, diffs: &[crate::diff::TreeDiffEntry]) -> CoreResult<()> {
        use crate::diff::TreeDiffEntry;

        let mut checker = IgnoreChecker::new(self.work_dir(), self.layout.meta_name());
        for diff in diffs {
            let path = diff.path();
            if checker.ignores(path, false) || self.in_nested_repo(path) {
                debug!(%path, "not applying change to excluded path");
                continue;
            }
            let target = path.to_fs_path(self.work_dir());
            match diff {
                TreeDiffEntry::Deleted { .. } => {
                    match fs::remove_file(&target) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                    self.prune_empty_dirs(path);
                }
                TreeDiffEntry::Added { new, .. } | TreeDiffEntry::Modified { new, .. } => {
                    let content = self.read_blob(new)?;
                    self.write_file_if_changed(&target, &content)?;
                }
            }
        }
        Ok(())
    }

    /// Writes `content` unless the file already holds it modulo CRLF.
    pub fn write_file_if_changed(&self, target: &Path, content: &[u8]) -> CoreResult<bool> {
        if let Ok(existing) = fs::read(target) {
            if same_except_crlf(&existing, content) {
                return Ok(false);
            }
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, content)?;
        Ok(true)
    }

    fn prune_empty_dirs(&self, path: &PathInRepo) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.is_root() {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the climb
            if fs::remove_dir(dir.to_fs_path(self.work_dir())).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}
