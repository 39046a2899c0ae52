//! SchedulerConfig - TOML で読み込むランタイム設定

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Runtime knobs of the scheduler. Every field has a default, so an empty
/// file is a valid configuration.
///
/// ```toml
/// max_concurrent_tasks = 4
/// idle_poll_interval_ms = 1000
/// guard_timeout_ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently running tasks; unlimited when absent.
    pub max_concurrent_tasks: Option<usize>,

    /// Longest the admission loop sleeps with nothing to do.
    pub idle_poll_interval_ms: u64,

    /// Record lock acquisition deadline. Exceeding it halts the scheduler.
    pub guard_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: None,
            idle_poll_interval_ms: 1_000,
            guard_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl SchedulerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.idle_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "idle_poll_interval_ms must be positive".into(),
            ));
        }
        if self.guard_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "guard_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }

    pub fn guard_timeout(&self) -> Duration {
        Duration::from_millis(self.guard_timeout_ms)
    }
}
