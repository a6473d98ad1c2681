//! Application configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use pv_data::{DiscoveryConfig, SessionConfig};
use pv_views::TableConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Settings for the `prospect` binary, read from an optional JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the shared CSV files
    pub data_dir: PathBuf,
    /// File backing the persisted session
    pub session_file: PathBuf,
    /// Rows printed by `show`
    pub preview_rows: usize,
    pub session: SessionConfig,
    pub discovery: DiscoveryConfig,
    pub table: TableConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            session_file: PathBuf::from(".prospect/session.json"),
            preview_rows: 20,
            session: SessionConfig::default(),
            discovery: DiscoveryConfig::default(),
            table: TableConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read a config file; missing fields take their defaults
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Config from `path` when given, defaults otherwise
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
