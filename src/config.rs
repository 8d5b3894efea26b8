//! Configuration types for msgplay

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{PlaybackError, Result};

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Upper bound on publishing a single reply, in milliseconds
    pub emit_timeout_ms: u64,
    /// Sleep between queue checks while no request is pending, in milliseconds
    pub idle_interval_ms: u64,
    /// Buffered replies per `received_messages` subscriber
    pub received_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            emit_timeout_ms: 5_000,
            idle_interval_ms: 50,
            received_capacity: 256,
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlaybackError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| PlaybackError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if any bound or capacity is zero
    pub fn validate(&self) -> Result<()> {
        if self.emit_timeout_ms == 0 {
            return Err(PlaybackError::ConfigError(
                "emit_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.idle_interval_ms == 0 {
            return Err(PlaybackError::ConfigError(
                "idle_interval_ms must be > 0".to_string(),
            ));
        }

        // tokio::sync::mpsc panics on a zero-capacity channel
        if self.received_capacity == 0 {
            return Err(PlaybackError::ConfigError(
                "received_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Emission bound as a [`Duration`]
    #[must_use]
    pub fn emit_timeout(&self) -> Duration {
        Duration::from_millis(self.emit_timeout_ms)
    }

    /// Idle wait as a [`Duration`]
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}
