//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the identity provider endpoint, its publishable API key,
//! and the last email used to sign in.
//!
//! Configuration is stored at `~/.config/tripledger/config.json`. The
//! provider URL and key may also be supplied via the `TRIPLEDGER_AUTH_URL`
//! and `TRIPLEDGER_AUTH_KEY` environment variables, which take precedence.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "tripledger";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub auth_url: Option<String>,
    pub auth_key: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config: Config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        // Environment overrides win over the config file
        if let Ok(url) = std::env::var("TRIPLEDGER_AUTH_URL") {
            config.auth_url = Some(url);
        }
        if let Ok(key) = std::env::var("TRIPLEDGER_AUTH_KEY") {
            config.auth_key = Some(key);
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session and local entry stores.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
