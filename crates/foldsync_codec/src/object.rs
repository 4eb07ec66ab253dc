//! Object framing and compression.
//!
//! Every stored object is the zlib-compressed form of
//! `"<kind> <content length>\0<content>"`. The object hash is the SHA-1 of
//! the uncompressed framed bytes.

use crate::error::{CodecError, CodecResult};
use crate::hash::{hash_bytes, Hash};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// The type tag of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// File contents.
    Blob,
    /// Directory listing.
    Tree,
    /// Snapshot with history metadata.
    Commit,
    /// Annotated tag. Accepted on read, never produced.
    Tag,
}

impl ObjectKind {
    /// Returns the header tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "tree" => Ok(Self::Tree),
            "commit" => Ok(Self::Commit),
            "tag" => Ok(Self::Tag),
            other => Err(CodecError::unknown_type(other)),
        }
    }
}

/// Prepends the `"<kind> <len>\0"` header to `content`.
#[must_use]
pub fn encode_object(kind: ObjectKind, content: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind, content.len());
    let mut framed = Vec::with_capacity(header.len() + content.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(content);
    framed
}

/// Splits framed bytes into kind and content, validating the length.
pub fn decode_object(framed: &[u8]) -> CodecResult<(ObjectKind, &[u8])> {
    let nul = framed
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CodecError::format("object header is not terminated"))?;
    let header = std::str::from_utf8(&framed[..nul])
        .map_err(|_| CodecError::format("object header is not UTF-8"))?;
    let (kind, len) = header
        .split_once(' ')
        .ok_or_else(|| CodecError::format(format!("bad object header {header:?}")))?;
    let kind: ObjectKind = kind.parse()?;
    let expected: usize = len
        .parse()
        .map_err(|_| CodecError::format(format!("bad object length {len:?}")))?;
    let content = &framed[nul + 1..];
    if content.len() != expected {
        return Err(CodecError::SizeMismatch {
            expected,
            actual: content.len(),
        });
    }
    Ok((kind, content))
}

/// Frames `content` and returns its hash together with the framed bytes.
#[must_use]
pub fn hash_object(kind: ObjectKind, content: &[u8]) -> (Hash, Vec<u8>) {
    let framed = encode_object(kind, content);
    (hash_bytes(&framed), framed)
}

/// Compresses bytes into a zlib stream.
pub fn compress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CodecError::format(format!("compression failed: {e}")))?;
    encoder
        .finish()
        .map_err(|e| CodecError::format(format!("compression failed: {e}")))
}

/// Inflates a zlib stream.
pub fn decompress(bytes: &[u8]) -> CodecResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::format(format!("bad compressed stream: {e}")))?;
    Ok(out)
}

/// Decompresses stored bytes and parses the framed object.
pub fn unpack_object(compressed: &[u8]) -> CodecResult<(ObjectKind, Vec<u8>)> {
    let framed = decompress(compressed)?;
    let (kind, content) = decode_object(&framed)?;
    Ok((kind, content.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout() {
        assert_eq!(encode_object(ObjectKind::Blob, b"hello"), b"blob 5\0hello");
        assert_eq!(encode_object(ObjectKind::Tree, b""), b"tree 0\0");
    }

    #[test]
    fn blob_hash_matches_git() {
        let (hash, _) = hash_object(ObjectKind::Blob, b"hello");
        assert_eq!(hash.as_str(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
    }

    #[test]
    fn decode_roundtrip() {
        let framed = encode_object(ObjectKind::Commit, b"tree x\n");
        let (kind, content) = decode_object(&framed).unwrap();
        assert_eq!(kind, ObjectKind::Commit);
        assert_eq!(content, b"tree x\n");
    }

    #[test]
    fn decode_size_mismatch() {
        let err = decode_object(b"blob 10\0short").unwrap_err();
        assert_eq!(
            err,
            CodecError::SizeMismatch {
                expected: 10,
                actual: 5
            }
        );
    }

    #[test]
    fn decode_unknown_type() {
        let err = decode_object(b"widget 0\0").unwrap_err();
        assert!(matches!(err, CodecError::UnknownType { .. }));
    }

    #[test]
    fn decode_missing_nul() {
        assert!(matches!(
            decode_object(b"blob 3abc"),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn compression_roundtrip() {
        let data = b"some data some data some data".repeat(20);
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn decompress_garbage_is_format_error() {
        assert!(matches!(
            decompress(b"definitely not zlib"),
            Err(CodecError::Format { .. })
        ));
    }

    #[test]
    fn unpack_stored_object() {
        let (_, framed) = hash_object(ObjectKind::Blob, b"abc");
        let (kind, content) = unpack_object(&compress(&framed).unwrap()).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(content, b"abc");
    }
}
