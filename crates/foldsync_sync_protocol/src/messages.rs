//! Request and response bodies, one pair per action.
//!
//! Every request is a `POST <server_url>?action=<action>` with a JSON body.
//! Field names are snake_case on the wire.

use crate::error::{ProtocolError, ProtocolResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use foldsync_codec::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Remote operation selected by the `action` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Create a repository.
    Create,
    /// Read a branch head.
    GetHead,
    /// Compare-and-swap a branch head.
    SetHead,
    /// Store objects.
    Upload,
    /// Fetch objects by age or by hash.
    Download,
}

impl Action {
    /// Every action, in protocol order.
    pub const ALL: [Self; 5] = [
        Self::Create,
        Self::GetHead,
        Self::SetHead,
        Self::Upload,
        Self::Download,
    ];

    /// Wire name of the action.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::GetHead => "get_head",
            Self::SetHead => "set_head",
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }

    /// Request URL for this action against `server_url`.
    #[must_use]
    pub fn url(self, server_url: &str) -> String {
        let sep = if server_url.contains('?') { '&' } else { '?' };
        format!("{server_url}{sep}action={}", self.as_str())
    }

    /// Extracts the action from a URL or path carrying `action=` in its query.
    pub fn from_url(url: &str) -> ProtocolResult<Self> {
        let query = url.split_once('?').map_or("", |(_, q)| q);
        let value = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("action="))
            .ok_or_else(|| ProtocolError::UnknownAction(String::new()))?;
        value.parse()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}

/// Body of `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Client key.
    pub api_key: String,
}

/// Reply to `create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    /// Identifier of the new repository.
    pub repo_id: String,
}

/// Body of `get_head`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeadRequest {
    /// Repository to read from.
    pub repo_id: String,
    /// Branch name.
    pub branch: String,
    /// When false the remote answers 404 for a missing head.
    #[serde(with = "int_flag")]
    pub allow_nonexistent: bool,
    /// Client key.
    pub api_key: String,
}

/// Reply to `get_head`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeadResponse {
    /// Current head, `null` when the branch does not exist.
    pub hash: Option<Hash>,
}

/// Body of `set_head`.
///
/// Without `current` the head is created; with it, the head moves only if
/// it still equals `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHeadRequest {
    /// Repository to update.
    pub repo_id: String,
    /// Branch name.
    pub branch: String,
    /// Head the caller last saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<Hash>,
    /// Head to install.
    pub next: Hash,
    /// Client key.
    pub api_key: String,
}

/// Reply to `set_head`: `"ok"` or the head actually in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHeadResponse {
    /// Raw status string.
    pub status: String,
}

/// Outcome of a compare-and-swap on a branch head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadUpdate {
    /// The head now holds the requested value.
    Applied,
    /// Someone else moved the head; it currently holds `actual`.
    Rejected {
        /// Head found on the remote.
        actual: Hash,
    },
}

const STATUS_OK: &str = "ok";

impl SetHeadResponse {
    /// Reply for an applied update.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.to_string(),
        }
    }

    /// Reply for a rejected update.
    #[must_use]
    pub fn rejected(actual: &Hash) -> Self {
        Self {
            status: actual.to_string(),
        }
    }

    /// Interprets the status string.
    pub fn into_update(self) -> ProtocolResult<HeadUpdate> {
        if self.status == STATUS_OK {
            return Ok(HeadUpdate::Applied);
        }
        Ok(HeadUpdate::Rejected {
            actual: Hash::parse(self.status.trim())?,
        })
    }
}

impl From<&HeadUpdate> for SetHeadResponse {
    fn from(update: &HeadUpdate) -> Self {
        match update {
            HeadUpdate::Applied => Self::ok(),
            HeadUpdate::Rejected { actual } => Self::rejected(actual),
        }
    }
}

/// An object on the wire: compressed bytes as standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireObject {
    /// Object identifier.
    pub hash: Hash,
    /// Base64 of the compressed framed object.
    pub content: String,
    /// Arrival time on the remote, in Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<i64>,
}

impl WireObject {
    /// Encodes raw object bytes.
    #[must_use]
    pub fn encode(hash: Hash, bytes: &[u8], mtime: Option<i64>) -> Self {
        Self {
            hash,
            content: STANDARD.encode(bytes),
            mtime,
        }
    }

    /// Decodes the content back to raw bytes.
    pub fn decode_content(&self) -> ProtocolResult<Vec<u8>> {
        STANDARD
            .decode(self.content.as_bytes())
            .map_err(|source| ProtocolError::Base64 {
                hash: self.hash.to_string(),
                source,
            })
    }
}

/// Body of `upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Repository to store into.
    pub repo_id: String,
    /// Client key.
    pub api_key: String,
    /// Objects to store; already present hashes are skipped.
    pub objects: Vec<WireObject>,
}

/// Reply to `upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Remote time the objects were stored at, in Unix seconds.
    pub timestamp: i64,
}

/// Body of `download`. Exactly one selector is normally given; with
/// `hash_list` present `since` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Repository to read from.
    pub repo_id: String,
    /// Client key.
    pub api_key: String,
    /// Return objects stored at or after this Unix second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    /// Return exactly these objects, skipping unknown ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_list: Option<Vec<Hash>>,
}

/// Reply to `download`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResponse {
    /// Matching objects.
    pub objects: Vec<WireObject>,
    /// Remote time of the reply; the next `since` to ask for.
    #[serde(default)]
    pub newest: i64,
}

/// Body of every non-200 reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable reason.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Serializes a request or response body.
pub fn to_body<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Parses a request or response body.
pub fn from_body<'a, T: Deserialize<'a>>(body: &'a [u8]) -> ProtocolResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// `allow_nonexistent` travels as `1`/`0`; booleans are accepted too.
mod int_flag {
    use super::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldsync_codec::hash_bytes;
    use serde_json::json;

    #[test]
    fn action_urls() {
        assert_eq!(
            Action::GetHead.url("https://h/sync.php"),
            "https://h/sync.php?action=get_head"
        );
        assert_eq!(Action::Upload.url("https://h/?x=1"), "https://h/?x=1&action=upload");
        assert_eq!(
            Action::from_url("https://h/sync.php?action=set_head").unwrap(),
            Action::SetHead
        );
        assert!(Action::from_url("https://h/?action=drop").is_err());
        assert!(Action::from_url("https://h/").is_err());
    }

    #[test]
    fn get_head_uses_integer_flag() {
        let req = GetHeadRequest {
            repo_id: "r".into(),
            branch: "main".into(),
            allow_nonexistent: true,
            api_key: "k".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["allow_nonexistent"], json!(1));

        let parsed: GetHeadRequest = serde_json::from_value(json!({
            "repo_id": "r", "branch": "main", "allow_nonexistent": false, "api_key": "k"
        }))
        .unwrap();
        assert!(!parsed.allow_nonexistent);
    }

    #[test]
    fn set_head_omits_current_on_create() {
        let req = SetHeadRequest {
            repo_id: "r".into(),
            branch: "main".into(),
            current: None,
            next: hash_bytes(b"n"),
            api_key: "k".into(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("current").is_none());
    }

    #[test]
    fn set_head_status_interpretation() {
        assert_eq!(SetHeadResponse::ok().into_update().unwrap(), HeadUpdate::Applied);
        let actual = hash_bytes(b"other");
        assert_eq!(
            SetHeadResponse::rejected(&actual).into_update().unwrap(),
            HeadUpdate::Rejected { actual }
        );
        let garbage = SetHeadResponse {
            status: "failed".into(),
        };
        assert!(garbage.into_update().is_err());
    }

    #[test]
    fn wire_object_base64() {
        let obj = WireObject::encode(hash_bytes(b"x"), &[0, 159, 255], None);
        assert_eq!(obj.content, "AJ//");
        assert_eq!(obj.decode_content().unwrap(), vec![0, 159, 255]);

        let value = serde_json::to_value(&obj).unwrap();
        assert!(value.get("mtime").is_none());

        let bad = WireObject {
            content: "%%%".into(),
            ..obj
        };
        assert!(matches!(
            bad.decode_content(),
            Err(ProtocolError::Base64 { .. })
        ));
    }

    #[test]
    fn download_request_selectors() {
        let since: DownloadRequest = from_body(br#"{"repo_id":"r","api_key":"k","since":10}"#).unwrap();
        assert_eq!(since.since, Some(10));
        assert_eq!(since.hash_list, None);

        let by_hash = DownloadRequest {
            repo_id: "r".into(),
            api_key: "k".into(),
            hash_list: Some(vec![hash_bytes(b"a")]),
            ..Default::default()
        };
        let body = to_body(&by_hash).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("hash_list"));
        assert!(!text.contains("since"));
    }
}
