//! Configuration management for saged.
//!
//! Loads settings from $SAGED_CONFIG, /etc/sage/config.toml or
//! /var/lib/sage/config.toml, first one found wins. Missing files mean defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sage_common::EngineConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/sage/config.toml";

/// Fallback config file path
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/sage/config.toml";

/// Environment override for the config file
pub const CONFIG_ENV: &str = "SAGED_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Ledgers and the attempt log live here
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON array of topics; defaults to <data_dir>/catalog.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/sage")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalog_path: None,
        }
    }
}

impl StorageConfig {
    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("catalog.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    /// Re-reads allowed when another write to the same ledger wins the race
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_default_limit: usize,

    #[serde(default = "default_leaderboard_max")]
    pub leaderboard_max_limit: usize,
}

fn default_max_conflict_retries() -> u32 {
    8
}

fn default_leaderboard_limit() -> usize {
    10
}

fn default_leaderboard_max() -> usize {
    100
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            leaderboard_default_limit: default_leaderboard_limit(),
            leaderboard_max_limit: default_leaderboard_max(),
        }
    }
}

impl From<&ProgressConfig> for EngineConfig {
    fn from(cfg: &ProgressConfig) -> Self {
        EngineConfig {
            max_conflict_retries: cfg.max_conflict_retries,
            leaderboard_default_limit: cfg.leaderboard_default_limit,
            leaderboard_max_limit: cfg.leaderboard_max_limit,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SagedConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub progress: ProgressConfig,
}

impl SagedConfig {
    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (command line)
    /// 2. $SAGED_CONFIG
    /// 3. /etc/sage/config.toml
    /// 4. /var/lib/sage/config.toml
    /// 5. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from(Path::new(&path));
        }

        for candidate in [CONFIG_PATH, DEFAULT_CONFIG_PATH] {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::from(&self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SagedConfig::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1:7870");
        assert_eq!(
            config.storage.catalog_path(),
            PathBuf::from("/var/lib/sage/catalog.json")
        );
        assert_eq!(config.progress.max_conflict_retries, 8);
    }

    #[test]
    fn test_partial_file() {
        let config = SagedConfig::parse(
            r#"
            [storage]
            data_dir = "/srv/sage"

            [progress]
            leaderboard_max_limit = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/sage"));
        assert_eq!(config.storage.catalog_path(), PathBuf::from("/srv/sage/catalog.json"));
        assert_eq!(config.progress.leaderboard_max_limit, 25);
        assert_eq!(config.progress.leaderboard_default_limit, 10);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let original = SagedConfig::default();
        let text = toml::to_string(&original).unwrap();
        assert_eq!(SagedConfig::parse(&text).unwrap(), original);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        assert!(SagedConfig::load(Some(Path::new("/nonexistent/sage.toml"))).is_err());
    }
}
