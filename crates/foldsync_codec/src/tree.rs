//! Tree object encoding.

use crate::error::{CodecError, CodecResult};
use crate::hash::{Hash, RAW_HASH_LEN};
use std::fmt;

/// Entry mode of a tree row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Regular file, `100644`.
    File,
    /// Sub-directory, `40000`.
    Directory,
}

impl Mode {
    /// Returns the ASCII mode string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "100644",
            Self::Directory => "40000",
        }
    }

    /// Parses an ASCII mode string.
    pub fn parse(value: &str) -> CodecResult<Self> {
        match value {
            "100644" => Ok(Self::File),
            "40000" => Ok(Self::Directory),
            other => Err(CodecError::format(format!("unsupported mode {other:?}"))),
        }
    }

    /// Returns true for directories.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single path component stored in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileName(String);

impl FileName {
    /// Validates a path component: non-empty, not `.` or `..`, no `/` or NUL.
    pub fn parse(value: impl Into<String>) -> CodecResult<Self> {
        let value = value.into();
        if value.is_empty()
            || value == "."
            || value == ".."
            || value.contains('/')
            || value.contains('\0')
        {
            return Err(CodecError::format(format!("invalid file name {value:?}")));
        }
        Ok(Self(value))
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One row of a directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    /// File or directory.
    pub mode: Mode,
    /// Entry name within its directory.
    pub name: FileName,
    /// Blob or tree hash.
    pub hash: Hash,
}

impl TreeEntry {
    /// Creates a file entry.
    #[must_use]
    pub fn file(name: FileName, hash: Hash) -> Self {
        Self {
            mode: Mode::File,
            name,
            hash,
        }
    }

    /// Creates a directory entry.
    #[must_use]
    pub fn directory(name: FileName, hash: Hash) -> Self {
        Self {
            mode: Mode::Directory,
            name,
            hash,
        }
    }
}

/// Encodes entries in the given order as `"<mode> <name>\0<raw hash>"` rows.
#[must_use]
pub fn encode_tree(entries: &[TreeEntry]) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend_from_slice(entry.mode.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(entry.name.as_str().as_bytes());
        out.push(0);
        out.extend_from_slice(&entry.hash.to_raw());
    }
    out
}

/// Parses tree content back into entries.
pub fn decode_tree(content: &[u8]) -> CodecResult<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    let mut rest = content;
    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| CodecError::format("tree entry without mode separator"))?;
        let mode = std::str::from_utf8(&rest[..space])
            .map_err(|_| CodecError::format("tree mode is not ASCII"))?;
        let mode = Mode::parse(mode)?;
        rest = &rest[space + 1..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CodecError::format("tree entry name is not terminated"))?;
        let name = std::str::from_utf8(&rest[..nul])
            .map_err(|_| CodecError::format("tree entry name is not UTF-8"))?;
        let name = FileName::parse(name)?;
        rest = &rest[nul + 1..];

        if rest.len() < RAW_HASH_LEN {
            return Err(CodecError::format("tree entry hash is truncated"));
        }
        let hash = Hash::from_raw_slice(&rest[..RAW_HASH_LEN])?;
        rest = &rest[RAW_HASH_LEN..];

        entries.push(TreeEntry { mode, name, hash });
    }
    Ok(entries)
}

/// Sorts entries by name so equal directory contents always hash the same.
pub fn sort_entries(entries: &mut [TreeEntry]) {
    entries.sort_by(|a, b| a.name.as_str().as_bytes().cmp(b.name.as_str().as_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    fn name(s: &str) -> FileName {
        FileName::parse(s).unwrap()
    }

    #[test]
    fn encode_decode() {
        let entries = vec![
            TreeEntry::file(name("a.txt"), hash_bytes(b"a")),
            TreeEntry::directory(name("sub dir"), hash_bytes(b"b")),
        ];
        let bytes = encode_tree(&entries);
        assert!(bytes.starts_with(b"100644 a.txt\0"));
        assert_eq!(decode_tree(&bytes).unwrap(), entries);
    }

    #[test]
    fn empty_tree() {
        assert!(encode_tree(&[]).is_empty());
        assert!(decode_tree(b"").unwrap().is_empty());
    }

    #[test]
    fn truncated_hash() {
        let mut bytes = encode_tree(&[TreeEntry::file(name("x"), hash_bytes(b"x"))]);
        bytes.truncate(bytes.len() - 3);
        assert!(decode_tree(&bytes).is_err());
    }

    #[test]
    fn bad_mode() {
        let mut bytes = b"100755 x\0".to_vec();
        bytes.extend_from_slice(&[0u8; 20]);
        assert!(decode_tree(&bytes).is_err());
    }

    #[test]
    fn file_name_validation() {
        assert!(FileName::parse("").is_err());
        assert!(FileName::parse("..").is_err());
        assert!(FileName::parse("a/b").is_err());
        assert!(FileName::parse("ok name.txt").is_ok());
    }

    #[test]
    fn sort_is_bytewise() {
        let mut entries = vec![
            TreeEntry::file(name("b"), hash_bytes(b"1")),
            TreeEntry::file(name("B"), hash_bytes(b"2")),
            TreeEntry::file(name("a"), hash_bytes(b"3")),
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["B", "a", "b"]);
    }
}
