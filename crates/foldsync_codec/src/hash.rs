//! Object identifiers.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use std::str::FromStr;

/// Length of a raw SHA-1 digest in bytes.
pub const RAW_HASH_LEN: usize = 20;

/// Length of a hex-encoded object hash.
pub const HEX_HASH_LEN: usize = RAW_HASH_LEN * 2;

/// A 40-character lowercase hex SHA-1 object identifier.
///
/// Construction always validates, so a `Hash` in hand is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    /// Parses a hex hash, accepting upper-case input and normalizing it.
    pub fn parse(value: &str) -> CodecResult<Self> {
        let value = value.trim();
        if value.len() != HEX_HASH_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CodecError::invalid_hash(value));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Builds a hash from its raw 20-byte form.
    #[must_use]
    pub fn from_raw(raw: &[u8; RAW_HASH_LEN]) -> Self {
        Self(hex::encode(raw))
    }

    /// Builds a hash from a slice that must be exactly 20 bytes long.
    pub fn from_raw_slice(raw: &[u8]) -> CodecResult<Self> {
        let raw: &[u8; RAW_HASH_LEN] = raw
            .try_into()
            .map_err(|_| CodecError::format(format!("raw hash has {} bytes", raw.len())))?;
        Ok(Self::from_raw(raw))
    }

    /// Returns the raw 20-byte digest.
    #[must_use]
    pub fn to_raw(&self) -> [u8; RAW_HASH_LEN] {
        let mut raw = [0u8; RAW_HASH_LEN];
        // Validated on construction, so decoding cannot fail.
        if hex::decode_to_slice(&self.0, &mut raw).is_err() {
            raw = [0u8; RAW_HASH_LEN];
        }
        raw
    }

    /// Returns the hex form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first `len` hex characters.
    #[must_use]
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(HEX_HASH_LEN)]
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Hash {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Hash {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<str> for Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the SHA-1 hex digest of `bytes`.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    let digest: [u8; RAW_HASH_LEN] = hasher.finalize().into();
    Hash::from_raw(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case() {
        let hash = Hash::parse("AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D").unwrap();
        assert_eq!(hash.as_str(), "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(Hash::parse("abc").is_err());
        assert!(Hash::parse(&"g".repeat(40)).is_err());
        assert!(Hash::parse("").is_err());
    }

    #[test]
    fn raw_roundtrip() {
        let hash = hash_bytes(b"hello");
        assert_eq!(Hash::from_raw(&hash.to_raw()), hash);
        assert!(Hash::from_raw_slice(&[0u8; 19]).is_err());
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_bytes(b"hello").as_str(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
    }

    #[test]
    fn short_prefix() {
        let hash = hash_bytes(b"hello");
        assert_eq!(hash.short(8), "aaf4c61d");
        assert_eq!(hash.short(100).len(), 40);
    }
}
