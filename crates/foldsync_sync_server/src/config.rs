//! Server configuration.

/// Configuration for the reference remote.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest number of objects accepted in one upload.
    pub max_upload_batch: usize,
    /// Reject uploads whose content does not hash to the claimed id.
    pub verify_uploads: bool,
    /// Reject requests carrying an empty api key.
    pub require_api_key: bool,
}

impl ServerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_upload_batch: 1000,
            verify_uploads: true,
            require_api_key: true,
        }
    }

    /// Sets the largest accepted upload.
    #[must_use]
    pub fn with_max_upload_batch(mut self, size: usize) -> Self {
        self.max_upload_batch = size;
        self
    }

    /// Enables or disables upload verification.
    #[must_use]
    pub fn with_verify_uploads(mut self, verify: bool) -> Self {
        self.verify_uploads = verify;
        self
    }

    /// Enables or disables the api key presence check.
    #[must_use]
    pub fn with_require_api_key(mut self, require: bool) -> Self {
        self.require_api_key = require;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let config = ServerConfig::new()
            .with_max_upload_batch(10)
            .with_verify_uploads(false)
            .with_require_api_key(false);
        assert_eq!(config.max_upload_batch, 10);
        assert!(!config.verify_uploads);
        assert!(!config.require_api_key);
    }
}
