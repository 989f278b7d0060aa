//! Sidecar configuration file
//!
//! Read from `<config_dir>/pika/sidecar.toml` unless a path is given.
//! Every section and key is optional.

use pika_analysis::MAX_DURATION_SECS;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shortest analysis prefix the config accepts
pub const MIN_CONFIG_DURATION_SECS: f32 = 1.0;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("analysis.max_duration_secs must be between 1 and 60, got {0}")]
    MaxDuration(f32),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the HTTP endpoint binds to
    pub host: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Length of the analyzed prefix
    pub max_duration_secs: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: MAX_DURATION_SECS,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secs = self.max_duration_secs;
        if !(MIN_CONFIG_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs) {
            return Err(ConfigError::MaxDuration(secs));
        }
        Ok(())
    }
}

impl Config {
    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pika")
            .join("sidecar.toml")
    }

    /// Parse and validate TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.analysis.validate()?;
        Ok(config)
    }
}
