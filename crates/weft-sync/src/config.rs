use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Tunables for the topographical sync strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Digests requested per `RequestLinear` page.
    pub page_limit: i64,
    /// Deadline for a single request/response exchange, in milliseconds.
    pub request_timeout_ms: u64,
    /// Capacity of per-subscriber message channels.
    pub channel_capacity: usize,
    /// Whether an announcement of unknown objects triggers a fetch.
    pub fetch_on_announcement: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_limit: 100,
            request_timeout_ms: 5_000,
            channel_capacity: 1024,
            fetch_on_announcement: true,
        }
    }
}

impl SyncConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Parse from TOML; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.page_limit < 1 {
            return Err(SyncError::Config("page_limit must be positive".into()));
        }
        if self.channel_capacity == 0 {
            return Err(SyncError::Config("channel_capacity must be positive".into()));
        }
        Ok(())
    }
}
