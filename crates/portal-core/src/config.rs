use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::state::SessionConfig;

pub const APP_DIR: &str = "agent-portal";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "portal".to_string(),
            password: "portal".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub credentials: Credentials,
    pub login_delay_ms: u64,
    pub watchdog_secs: u64,
    pub capabilities: SessionConfig,
    pub start_button_text: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            credentials: Credentials::default(),
            login_delay_ms: 1000,
            watchdog_secs: 20,
            capabilities: SessionConfig::default(),
            start_button_text: "Start call".to_string(),
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Load the default config, writing it out on first run so it can be
    /// edited.
    pub fn load_or_create() -> Result<Self> {
        if Self::get_config_path()?.exists() {
            return Self::load();
        }
        let config = Self::new();
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn watchdog_delay(&self) -> Duration {
        Duration::from_secs(self.watchdog_secs)
    }

    pub fn login_delay(&self) -> Duration {
        Duration::from_millis(self.login_delay_ms)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join(APP_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.watchdog_secs, 20);
        assert_eq!(config.login_delay_ms, 1000);
        assert_eq!(config.credentials, Credentials::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::new();
        config.watchdog_secs = 5;
        config.capabilities.supports_screen_share = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.watchdog_delay(), Duration::from_secs(5));
        assert!(!loaded.capabilities.supports_screen_share);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "watchdog_secs": 3 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.watchdog_secs, 3);
        assert_eq!(config.start_button_text, "Start call");
        assert!(config.capabilities.supports_chat_input);
    }
}
