use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_update_interval")]
    pub update_interval_seconds: u64,

    #[serde(default = "default_max_fingerprints")]
    pub max_fingerprints_per_feed: usize,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,

    /// One `<channel> <name> <url> [<format>]` line per feed.
    #[serde(default)]
    pub feeds: Vec<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rss-announcer");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("fingerprints.db").to_string_lossy().to_string()
}

fn default_update_interval() -> u64 {
    60
}

fn default_max_fingerprints() -> usize {
    100
}

fn default_fetch_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            update_interval_seconds: default_update_interval(),
            max_fingerprints_per_feed: default_max_fingerprints(),
            fetch_timeout_seconds: default_fetch_timeout(),
            feeds: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads the config at `path`, writing a default one first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rss-announcer")
            .join("config.toml")
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.max_fingerprints_per_feed == 0 {
            return Err(AppError::Config(
                "max_fingerprints_per_feed must be at least 1".to_string(),
            ));
        }
        if self.update_interval_seconds == 0 {
            return Err(AppError::Config(
                "update_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(AppError::Config(
                "fetch_timeout_seconds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
