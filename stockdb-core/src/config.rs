//! Ingestion configuration.
//!
//! An explicit struct handed to the orchestrator at construction — no
//! process-wide settings. Loadable from TOML; `Default` carries the
//! reference values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use std::time::Duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for one ingestion service instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Root directory holding all per-exchange tables.
    pub store_root: PathBuf,

    /// Number of tickers sent to the provider per batch.
    pub batch_size: usize,

    /// Per-request timeout for provider fetches, in seconds.
    pub fetch_timeout_secs: u64,

    /// How many times a run is re-resolved and retried after a merge
    /// conflict before giving up.
    pub max_merge_retries: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("data"),
            batch_size: 100,
            fetch_timeout_secs: 30,
            max_merge_retries: 2,
        }
    }
}

impl IngestionConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be greater than zero".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
