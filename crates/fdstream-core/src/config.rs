//! Configuration for the stream engine.
//!
//! Everything here has a working default; a TOML file only needs the keys
//! it wants to change:
//!
//! ```toml
//! [engine]
//! chunk_size = 8192
//! timeout_divisor = 1
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "unknown log format: {s}. Expected one of: pretty, json"
            )),
        }
    }
}

/// Tuning knobs for the read and write engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the scratch chunk used for line and read-all OS reads.
    pub chunk_size: usize,
    /// A finite deadline is polled every `deadline / poll_divisor`.
    pub poll_divisor: u64,
    /// Floor for the derived poll interval (milliseconds).
    pub min_poll_interval_ms: u64,
    /// Poll interval when waiting without a deadline (milliseconds).
    pub infinite_poll_interval_ms: u64,
    /// Units per second of caller-supplied timeouts: 1000 for milliseconds,
    /// 1 for seconds.
    pub timeout_divisor: u32,
    /// Staging buffer size for in-flight overlapped reads (Windows).
    pub overlapped_scratch_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            poll_divisor: 10,
            min_poll_interval_ms: 1,
            infinite_poll_interval_ms: 100,
            timeout_divisor: 1000,
            overlapped_scratch_capacity: 64 * 1024,
        }
    }
}

impl EngineConfig {
    /// Reject values that would make the engine spin or never read.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be > 0".into()));
        }
        if self.poll_divisor == 0 {
            return Err(ConfigError::Invalid("poll_divisor must be > 0".into()));
        }
        if self.min_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "min_poll_interval_ms must be > 0".into(),
            ));
        }
        if self.infinite_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "infinite_poll_interval_ms must be > 0".into(),
            ));
        }
        if self.timeout_divisor == 0 {
            return Err(ConfigError::Invalid("timeout_divisor must be > 0".into()));
        }
        if self.overlapped_scratch_capacity == 0 {
            return Err(ConfigError::Invalid(
                "overlapped_scratch_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Poll interval used while waiting for a deadline of `deadline_ms`.
    #[must_use]
    pub fn poll_interval_for(&self, deadline_ms: u64) -> Duration {
        let divisor = self.poll_divisor.max(1);
        Duration::from_millis((deadline_ms / divisor).max(self.min_poll_interval_ms))
    }

    /// Poll interval used while waiting without a deadline.
    #[must_use]
    pub fn infinite_poll_interval(&self) -> Duration {
        Duration::from_millis(self.infinite_poll_interval_ms)
    }
}

/// Top-level configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LogConfig,
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
