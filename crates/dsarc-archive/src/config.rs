//! Configuration for the archive service

use crate::error::ArchiveResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the archive service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Unpack DSARC entries that are themselves containers into child folders
    pub nested_extraction: bool,

    /// Let saves read untouched entries from the archive they were opened from
    pub fallback_to_original: bool,

    /// Create missing destination folders before extracting
    pub create_destination: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            nested_extraction: false,
            fallback_to_original: true,
            create_destination: true,
        }
    }
}

impl ServiceConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ArchiveResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Enable or disable nested extraction
    #[must_use]
    pub const fn with_nested_extraction(mut self, enable: bool) -> Self {
        self.nested_extraction = enable;
        self
    }

    /// Enable or disable the original-archive fallback on save
    #[must_use]
    pub const fn with_fallback_to_original(mut self, enable: bool) -> Self {
        self.fallback_to_original = enable;
        self
    }

    /// Enable or disable destination folder creation
    #[must_use]
    pub const fn with_create_destination(mut self, enable: bool) -> Self {
        self.create_destination = enable;
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert!(!config.nested_extraction);
        assert!(config.fallback_to_original);
        assert!(config.create_destination);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = dir.path().join("service.json");
        std::fs::write(&path, r#"{ "nested_extraction": true }"#).expect("write");

        let config = ServiceConfig::from_json_file(&path).expect("Operation should succeed");
        assert_eq!(config, ServiceConfig::new().with_nested_extraction(true));
    }

    #[test]
    fn test_bad_json() {
        let dir = tempfile::tempdir().expect("Operation should succeed");
        let path = dir.path().join("service.json");
        std::fs::write(&path, "{ nope").expect("write");
        assert!(matches!(
            ServiceConfig::from_json_file(&path),
            Err(crate::error::ArchiveError::Config(_))
        ));
    }
}
