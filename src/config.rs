//! Configuration Management
//!
//! Handles persistent configuration storage for polsync. Secrets are not
//! stored here; see [`crate::appliance::auth`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const BASE_URL_ENV: &str = "POLSYNC_BASE_URL";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Appliance address, e.g. `https://ise.example.com:9060`
    #[serde(default)]
    pub base_url: Option<String>,
    /// API account name
    #[serde(default)]
    pub username: Option<String>,
    /// Verify the appliance's TLS certificate
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,
    /// Entries requested per page when listing collections
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_verify_tls() -> bool {
    true
}

fn default_page_size() -> u32 {
    crate::engine::api::DEFAULT_PAGE_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            verify_tls: default_verify_tls(),
            page_size: default_page_size(),
        }
    }
}

/// Values given on the command line for `configure`; `None` keeps the stored value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub page_size: Option<u32>,
    pub verify_tls: Option<bool>,
}

impl Config {
    /// Merge explicitly given values into the stored configuration
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(username) = overrides.username {
            self.username = Some(username);
        }
        if let Some(page_size) = overrides.page_size {
            self.page_size = page_size.max(1);
        }
        if let Some(verify_tls) = overrides.verify_tls {
            self.verify_tls = verify_tls;
        }
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("polsync").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;

        Ok(())
    }

    /// Get effective base URL (CLI > environment > config)
    pub fn effective_base_url(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string())
            .or_else(|| std::env::var(BASE_URL_ENV).ok().filter(|s| !s.is_empty()))
            .or_else(|| self.base_url.clone())
    }

    /// Get effective username (CLI > config); `None` defers to the environment
    pub fn effective_username(&self, cli: Option<&str>) -> Option<String> {
        cli.map(|s| s.to_string()).or_else(|| self.username.clone())
    }
}
