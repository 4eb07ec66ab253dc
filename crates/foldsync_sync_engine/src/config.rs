//! Configuration for the sync engine.

use foldsync_core::{BranchName, DEFAULT_META_DIR};
use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Branch used when HEAD is missing and for new working copies.
    pub branch: BranchName,
    /// Name recorded as author and committer.
    pub author_name: String,
    /// E-mail recorded as author and committer.
    pub author_email: String,
    /// Rounds `sync_with_retry` may use before giving up.
    pub max_sync_rounds: u32,
    /// Objects per upload request.
    pub upload_batch_size: usize,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
    /// Name of the metadata directory inside a working copy.
    pub meta_dir: String,
}

impl SyncConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            branch: BranchName::main(),
            author_name: "foldsync".to_string(),
            author_email: "foldsync@localhost".to_string(),
            max_sync_rounds: 5,
            upload_batch_size: 100,
            request_timeout: Duration::from_secs(30),
            meta_dir: DEFAULT_META_DIR.to_string(),
        }
    }

    /// Sets the default branch.
    #[must_use]
    pub fn with_branch(mut self, branch: BranchName) -> Self {
        self.branch = branch;
        self
    }

    /// Sets the commit identity.
    #[must_use]
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Sets the round budget of `sync_with_retry`.
    #[must_use]
    pub fn with_max_sync_rounds(mut self, rounds: u32) -> Self {
        self.max_sync_rounds = rounds;
        self
    }

    /// Sets the upload batch size. Zero is treated as one.
    #[must_use]
    pub fn with_upload_batch_size(mut self, size: usize) -> Self {
        self.upload_batch_size = size.max(1);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the metadata directory name.
    #[must_use]
    pub fn with_meta_dir(mut self, name: impl Into<String>) -> Self {
        self.meta_dir = name.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.branch, BranchName::main());
        assert_eq!(config.max_sync_rounds, 5);
        assert_eq!(config.upload_batch_size, 100);
        assert_eq!(config.meta_dir, ".foldsync");
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_branch(BranchName::parse("work").unwrap())
            .with_author("Ann", "ann@example.com")
            .with_max_sync_rounds(3)
            .with_upload_batch_size(0)
            .with_request_timeout(Duration::from_secs(5))
            .with_meta_dir(".sync");
        assert_eq!(config.branch.as_str(), "work");
        assert_eq!(config.author_name, "Ann");
        assert_eq!(config.max_sync_rounds, 3);
        assert_eq!(config.upload_batch_size, 1);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.meta_dir, ".sync");
    }
}
