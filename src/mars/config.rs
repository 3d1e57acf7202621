//! Match configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mars::core::DEFAULT_CORE_SIZE;

/// Limits for one match. Fixed for the lifetime of a [`Mars`](crate::Mars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarsConfig {
    /// Number of core cells.
    pub core_size: usize,
    /// Rounds before the match is declared a tie.
    pub max_cycles: u64,
    /// Warriors must compile to fewer instructions than this.
    pub max_length: usize,
    /// Upper bound on a warrior's live threads; extra forks are dropped.
    pub max_tasks: usize,
}

impl MarsConfig {
    pub const DEFAULT_MAX_CYCLES: u64 = 65_536;
    pub const DEFAULT_MAX_LENGTH: usize = 256;
    pub const DEFAULT_MAX_TASKS: usize = 16;

    /// Check that the limits describe a playable match.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_size == 0 {
            return Err(ConfigError::Invalid("core_size must be positive".into()));
        }
        if self.max_cycles == 0 {
            return Err(ConfigError::Invalid("max_cycles must be positive".into()));
        }
        if self.max_tasks == 0 {
            return Err(ConfigError::Invalid("max_tasks must be positive".into()));
        }
        if self.max_length >= self.core_size {
            return Err(ConfigError::Invalid(format!(
                "max_length ({}) must be smaller than core_size ({})",
                self.max_length, self.core_size
            )));
        }
        Ok(())
    }

    /// Parse a (possibly partial) JSON configuration; missing keys keep
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json_str(&text)
    }
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            max_cycles: Self::DEFAULT_MAX_CYCLES,
            max_length: Self::DEFAULT_MAX_LENGTH,
            max_tasks: Self::DEFAULT_MAX_TASKS,
        }
    }
}

/// Errors from building or loading a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("malformed configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
