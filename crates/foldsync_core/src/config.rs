//! Remote connection settings stored in each working copy.

use serde::{Deserialize, Serialize};

/// Where a working copy syncs to.
///
/// Persisted as `remote.json` in the metadata directory:
///
/// ```json
/// {"serverUrl": "https://example.org/sync.php", "repoId": "abc", "apiKey": "k"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoConfig {
    /// Endpoint URL of the remote.
    pub server_url: String,
    /// Repository id assigned by the remote.
    pub repo_id: String,
    /// Client key sent with every request. Generated when missing.
    #[serde(default)]
    pub api_key: String,
}

impl RepoConfig {
    /// Creates a config with a freshly generated api key.
    pub fn new(server_url: impl Into<String>, repo_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            repo_id: repo_id.into(),
            api_key: generate_api_key(),
        }
    }

    /// Sets the api key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Fills in a missing api key. Returns true if one was generated.
    pub fn ensure_api_key(&mut self) -> bool {
        if self.api_key.is_empty() {
            self.api_key = generate_api_key();
            true
        } else {
            false
        }
    }
}

/// Random client key.
#[must_use]
pub fn generate_api_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
