use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_LOG_LEVEL: tracing::Level = tracing::Level::INFO;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    pub store: StoreSection,
    #[serde(default)]
    pub model_cache: Option<ModelCacheSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreSection {
    /// JSON fleet snapshot with bins and fill readings
    pub fleet_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelCacheSection {
    /// Directory for per-bin trend models; in-memory cache when unset
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn fleet_path(&self) -> &Path {
        &self.store.fleet_path
    }

    pub fn model_cache_dir(&self) -> Option<&Path> {
        let dir = self.model_cache.as_ref()?.dir.as_deref()?;
        if dir.as_os_str().is_empty() {
            None
        } else {
            Some(dir)
        }
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the configured log level, or INFO when unrecognised.
    pub fn log_level(&self) -> tracing::Level {
        self.logging
            .level
            .trim()
            .parse()
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }
}
