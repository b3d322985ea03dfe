use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_interests_path")]
    pub interests_path: String,

    /// Bearer token for the HTTP API. Unset = open (dev mode).
    pub api_token: Option<String>,

    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,

    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    #[serde(default = "default_scoring_batch_limit")]
    pub scoring_batch_limit: usize,
}

fn data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("feedrank");
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn default_db_path() -> String {
    data_dir().join("feedrank.db").to_string_lossy().to_string()
}

fn default_interests_path() -> String {
    data_dir()
        .join("interests.yaml")
        .to_string_lossy()
        .to_string()
}

fn default_cycle_interval() -> u64 {
    3600
}

fn default_scoring_batch_limit() -> usize {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            interests_path: default_interests_path(),
            api_token: None,
            notion_token: None,
            notion_database_id: None,
            cycle_interval_secs: default_cycle_interval(),
            scoring_batch_limit: default_scoring_batch_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("feedrank")
            .join("config.toml")
    }
}
