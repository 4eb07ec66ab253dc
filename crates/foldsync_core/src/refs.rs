//! HEAD, branch heads and MERGE_HEAD.

use crate::error::{CoreError, CoreResult};
use crate::repo::Repository;
use crate::types::{BranchName, RefName};
use foldsync_codec::Hash;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SYMREF_PREFIX: &str = "ref: ";

fn read_optional(path: &Path) -> CoreResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Repository {
    fn ref_path(&self, name: &RefName) -> PathBuf {
        name.as_str()
            .split('/')
            .fold(self.layout.meta_dir().to_path_buf(), |p, c| p.join(c))
    }

    /// Returns true once HEAD has been written.
    #[must_use]
    pub fn has_head_file(&self) -> bool {
        self.layout.head_path().is_file()
    }

    /// Branch named by HEAD.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RefNotFound`] if HEAD is missing and
    /// [`CoreError::DetachedHead`] if it does not point at a branch.
    pub fn current_branch(&self) -> CoreResult<BranchName> {
        let content = read_optional(&self.layout.head_path())?
            .ok_or_else(|| CoreError::ref_not_found("HEAD"))?;
        content
            .trim()
            .strip_prefix(SYMREF_PREFIX)
            .and_then(|r| RefName::parse(r.trim()).ok())
            .and_then(|r| r.branch())
            .ok_or(CoreError::DetachedHead { content })
    }

    /// Points HEAD at a branch.
    pub fn set_current_branch(&self, branch: &BranchName) -> CoreResult<()> {
        let content = format!("{SYMREF_PREFIX}{}\n", RefName::local(branch));
        fs::write(self.layout.head_path(), content)?;
        Ok(())
    }

    /// Commit a reference points at, or `None` if the reference is unset.
    pub fn read_head(&self, name: &RefName) -> CoreResult<Option<Hash>> {
        let path = self.ref_path(name);
        match read_optional(&path)? {
            Some(text) => Ok(Some(Hash::parse(&text)?)),
            None => Ok(None),
        }
    }

    /// Moves a reference.
    pub fn update_head(&self, name: &RefName, hash: &Hash) -> CoreResult<()> {
        let path = self.ref_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{hash}\n"))?;
        Ok(())
    }

    /// The remote parent of an in-progress merge.
    pub fn read_merge_head(&self) -> CoreResult<Option<Hash>> {
        match read_optional(&self.layout.merge_head_path())? {
            Some(text) => Ok(Some(Hash::parse(&text)?)),
            None => Ok(None),
        }
    }

    /// Records or clears the in-progress merge parent.
    pub fn write_merge_head(&self, hash: Option<&Hash>) -> CoreResult<()> {
        let path = self.layout.merge_head_path();
        match hash {
            Some(hash) => fs::write(path, format!("{hash}\n"))?,
            None => match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}
