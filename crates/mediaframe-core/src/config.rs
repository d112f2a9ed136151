//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the API
//! base URL, HTTP timeouts, session refresh timing, and where the session is
//! persisted.
//!
//! Configuration is stored at `~/.config/mediaframe/config.json`. Every field
//! has a default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileTokenStore, KeyringTokenStore, TokenStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "mediaframe";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "MEDIAFRAME_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Where the token pair is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    /// Period of the session refresh check.
    pub refresh_interval_secs: u64,
    /// Refresh when the access token expires within this many seconds.
    pub refresh_threshold_secs: u64,
    pub logout_timeout_secs: u64,
    pub token_store: TokenStoreKind,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            refresh_interval_secs: 180,
            refresh_threshold_secs: 180,
            logout_timeout_secs: 5,
            token_store: TokenStoreKind::File,
            last_username: None,
        }
    }
}

impl Config {
    /// Load from the user config directory, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the configured token store.
    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        Ok(match self.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::in_dir(&self.data_dir()?)),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
        })
    }
}
