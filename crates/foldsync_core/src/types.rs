//! Validated name types.

use crate::error::{CoreError, CoreResult};
use foldsync_codec::FileName;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of a branch, e.g. `main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Validates a branch name.
    ///
    /// Rejects empty names, whitespace and control characters, `..`,
    /// and leading or trailing `/`.
    pub fn parse(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        let valid = !value.is_empty()
            && !value.starts_with('/')
            && !value.ends_with('/')
            && !value.contains("..")
            && !value.contains("//")
            && !value.chars().any(|c| c.is_whitespace() || c.is_control());
        if !valid {
            return Err(CoreError::invalid_name("branch name", value));
        }
        Ok(Self(value))
    }

    /// The default branch, `main`.
    #[must_use]
    pub fn main() -> Self {
        Self("main".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

/// A reference path under the metadata directory, e.g. `refs/heads/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefName(String);

impl RefName {
    const HEADS: &'static str = "refs/heads/";

    /// Validates a reference path.
    pub fn parse(value: impl Into<String>) -> CoreResult<Self> {
        let value = value.into();
        let valid = value.starts_with("refs/")
            && value
                .split('/')
                .all(|c| !c.is_empty() && c != "." && c != "..")
            && !value.chars().any(|c| c.is_whitespace() || c.is_control());
        if !valid {
            return Err(CoreError::invalid_name("ref name", value));
        }
        Ok(Self(value))
    }

    /// Reference of a local branch head.
    #[must_use]
    pub fn local(branch: &BranchName) -> Self {
        Self(format!("{}{}", Self::HEADS, branch))
    }

    /// Branch name if this is a local branch head.
    #[must_use]
    pub fn branch(&self) -> Option<BranchName> {
        self.0
            .strip_prefix(Self::HEADS)
            .and_then(|b| BranchName::parse(b).ok())
    }

    /// Returns the reference path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `/`-separated path relative to the working directory root.
///
/// The empty path denotes the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathInRepo(String);

impl PathInRepo {
    /// Validates a relative path. Backslashes are treated as separators.
    pub fn parse(value: impl Into<String>) -> CoreResult<Self> {
        let value: String = value.into().replace('\\', "/");
        if value.is_empty() {
            return Ok(Self::root());
        }
        let valid = !value.starts_with('/')
            && value
                .split('/')
                .all(|c| !c.is_empty() && c != "." && c != ".." && !c.contains('\0'));
        if !valid {
            return Err(CoreError::invalid_name("path", value));
        }
        Ok(Self(value))
    }

    /// The working directory root.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns true for the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends one component.
    #[must_use]
    pub fn join(&self, name: &FileName) -> Self {
        if self.is_root() {
            Self(name.as_str().to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Final component, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// Containing directory; the root has none.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Iterates the components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }

    /// Resolves against a working directory.
    #[must_use]
    pub fn to_fs_path(&self, work_dir: &Path) -> PathBuf {
        self.components().fold(work_dir.to_path_buf(), |p, c| p.join(c))
    }

    /// Builds the relative path of `path` inside `work_dir`.
    pub fn from_fs_path(work_dir: &Path, path: &Path) -> CoreResult<Self> {
        let rel = path
            .strip_prefix(work_dir)
            .map_err(|_| CoreError::invalid_name("path", path.display().to_string()))?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Self::parse(parts.join("/"))
    }

    /// Returns the path string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathInRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PathInRepo {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PathInRepo> for String {
    fn from(path: PathInRepo) -> Self {
        path.0
    }
}

impl AsRef<str> for PathInRepo {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_names() {
        assert!(BranchName::parse("main").is_ok());
        assert!(BranchName::parse("feature/x").is_ok());
        assert!(BranchName::parse("").is_err());
        assert!(BranchName::parse("a b").is_err());
        assert!(BranchName::parse("a/../b").is_err());
        assert!(BranchName::parse("/a").is_err());
    }

    #[test]
    fn local_ref() {
        let r = RefName::local(&BranchName::main());
        assert_eq!(r.as_str(), "refs/heads/main");
        assert_eq!(r.branch(), Some(BranchName::main()));
        assert!(RefName::parse("HEAD").is_err());
        assert!(RefName::parse("refs/heads/../x").is_err());
    }

    #[test]
    fn path_navigation() {
        let p = PathInRepo::parse("a/b/c.txt").unwrap();
        assert_eq!(p.file_name(), Some("c.txt"));
        assert_eq!(p.parent().unwrap().as_str(), "a/b");
        assert_eq!(
            PathInRepo::parse("a").unwrap().parent(),
            Some(PathInRepo::root())
        );
        assert_eq!(PathInRepo::root().parent(), None);

        let joined = PathInRepo::root().join(&FileName::parse("x").unwrap());
        assert_eq!(joined.as_str(), "x");
    }

    #[test]
    fn path_rejects_escapes() {
        assert!(PathInRepo::parse("../x").is_err());
        assert!(PathInRepo::parse("/abs").is_err());
        assert!(PathInRepo::parse("a//b").is_err());
        assert_eq!(PathInRepo::parse("a\\b").unwrap().as_str(), "a/b");
    }

    #[test]
    fn fs_path_roundtrip() {
        let root = Path::new("/tmp/work");
        let p = PathInRepo::parse("dir/file.txt").unwrap();
        let fs = p.to_fs_path(root);
        assert_eq!(fs, root.join("dir").join("file.txt"));
        assert_eq!(PathInRepo::from_fs_path(root, &fs).unwrap(), p);
    }
}
