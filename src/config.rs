//! Configuration file handling.
//!
//! TOML, stored under the platform data directory next to the device
//! store. Contains operator/deployment settings only: where the Exchange
//! lives, where local state goes, how loud the logs are. Nothing about
//! poll rules — those are the Exchange's to own.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AgoraError, AgoraResult};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgoraConfig {
    /// Remote Exchange endpoint settings.
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Device-local store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Base URL of the Exchange, no trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Fixed API path prefix. Part of the signing contract: the server
    /// reconstructs signed paths including this prefix, so it must match
    /// the deployment exactly.
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the device store file.
    #[serde(default = "default_store_file")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_path_prefix() -> String {
    "/api".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// Platform data directory for agora state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agora")
}

fn default_store_file() -> PathBuf {
    default_data_dir().join("store.json")
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            path_prefix: default_path_prefix(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_file(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AgoraConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> AgoraResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AgoraError::Store(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AgoraError::Store(format!("parse {}: {e}", path.display())))
    }

    /// Write this configuration to a TOML file, creating parent dirs.
    pub fn save(&self, path: &Path) -> AgoraResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AgoraError::Store(format!("mkdir {}: {e}", parent.display())))?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| AgoraError::Store(format!("serialize config: {e}")))?;
        fs::write(path, raw)
            .map_err(|e| AgoraError::Store(format!("write {}: {e}", path.display())))
    }

    /// Load the config at `path`, writing defaults there first if absent.
    pub fn load_or_create(path: &Path) -> AgoraResult<Self> {
        if !path.exists() {
            AgoraConfig::default().save(path)?;
            tracing::info!(path = %path.display(), "created default configuration");
        }
        Self::load(path)
    }
}
