//! Configuration for the emulator endpoint and snapshot location
//!
//! A single endpoint and region are shared by every service. The
//! configuration is resolved once at startup and handed to the connector
//! and the snapshot store.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default emulator edge endpoint
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:4566";

/// Default region for every service client
pub const DEFAULT_REGION: &str = "us-east-1";

/// Settings shared by all service connectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Base URL of the emulator, used for every service
    pub endpoint_url: String,
    /// Region used for every service client
    pub region: String,
    /// Directory holding the six snapshot files
    pub snapshot_dir: PathBuf,
}

impl EmulatorConfig {
    /// Replace the endpoint URL
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = endpoint_url.into();
        self
    }

    /// Replace the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Replace the snapshot directory
    pub fn with_snapshot_dir(mut self, snapshot_dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = snapshot_dir.into();
        self
    }

    /// Whether buckets created in this region need a location constraint
    pub fn needs_location_constraint(&self) -> bool {
        self.region != DEFAULT_REGION
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let host = self
            .endpoint_url
            .strip_prefix("http://")
            .or_else(|| self.endpoint_url.strip_prefix("https://"))
            .ok_or_else(|| {
                crate::StackshotError::validation(format!(
                    "endpoint URL must start with http:// or https://, got '{}'",
                    self.endpoint_url
                ))
            })?;

        if host.trim_end_matches('/').is_empty() {
            return Err(crate::StackshotError::validation(
                "endpoint URL is missing a host",
            ));
        }

        if self.region.trim().is_empty() {
            return Err(crate::StackshotError::validation("region must not be empty"));
        }

        Ok(())
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            region: DEFAULT_REGION.to_string(),
            snapshot_dir: PathBuf::from("."),
        }
    }
}
