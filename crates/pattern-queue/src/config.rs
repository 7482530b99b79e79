//! Runtime configuration

use crate::error::ConfigError;
use crate::queue::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the queue, scheduler and store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Live pattern file
    pub pattern_path: PathBuf,
    /// Scheduler tick period in milliseconds
    pub tick_interval_ms: u64,
    /// Upper bound on one mutation capability call, in seconds
    pub fallback_timeout_secs: u64,
    /// Terminal records retained for listing
    pub history_limit: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            pattern_path: PathBuf::from("patterns.js"),
            tick_interval_ms: 250,
            fallback_timeout_secs: 60,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl PatternConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text; missing keys take their defaults
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`PatternConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "tick_interval_ms",
                reason: "must be positive".into(),
            });
        }
        if self.fallback_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fallback_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        if self.pattern_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "pattern_path",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// With pattern file path
    #[inline]
    #[must_use]
    pub fn with_pattern_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pattern_path = path.into();
        self
    }

    /// With tick interval
    #[inline]
    #[must_use]
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// With fallback timeout
    #[inline]
    #[must_use]
    pub fn with_fallback_timeout_secs(mut self, secs: u64) -> Self {
        self.fallback_timeout_secs = secs;
        self
    }

    /// With history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Tick period
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Fallback timeout
    #[inline]
    #[must_use]
    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}
