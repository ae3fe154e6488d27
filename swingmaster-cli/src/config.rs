//! TOML run configuration for the range runner.
//!
//! Everything here can also be given as CLI flags; a config file keeps
//! repeated backfills reproducible.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub run: RunSection,
    #[serde(default)]
    pub universe: UniverseSection,
}

#[derive(Debug, Deserialize)]
pub struct RunSection {
    pub md_db: String,
    pub rc_db: String,
    pub date_from: String,
    pub date_to: String,
    #[serde(default = "default_version")]
    pub signal_version: String,
    #[serde(default = "default_version")]
    pub policy_version: String,
    #[serde(default)]
    pub require_row_on_date: bool,
    /// Market code to score after each day; omit to skip EW scoring.
    #[serde(default)]
    pub ew_market: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UniverseSection {
    /// Explicit ticker list; takes precedence over `market`.
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_version() -> String {
    "v3".to_string()
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("TOML parse error: {0}")]
    Parse(String),
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
