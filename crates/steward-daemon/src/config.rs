//! Daemon configuration parsing.
//!
//! A small TOML file: where the data directory lives plus an `[engine]`
//! section with the dispatch knobs. Every field has a default, so a
//! missing file is a valid (all-defaults) configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use steward_core::EngineConfig;
use thiserror::Error;

/// Daemon configuration error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StewardConfig {
    /// Root of the on-disk vault; one subdirectory per project.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Dispatch engine knobs.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl StewardConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            engine: EngineConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/steward")
}
