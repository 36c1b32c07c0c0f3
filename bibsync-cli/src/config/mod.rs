//! Runtime configuration
//!
//! Settings come from a TOML file under the user config directory, overlaid
//! with environment variables (a `.env` file is honored). CLI flags override
//! both.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub zotero: ZoteroConfig,
    #[serde(default)]
    pub bookends: BookendsConfig,
}

/// Zotero access configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZoteroConfig {
    /// Library path prefix, "groups/<id>" or "users/<id>"
    pub prefix: Option<String>,
    /// zotero.org API key
    pub api_key: Option<String>,
}

/// Bookends-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookendsConfig {
    /// Group to synchronize ("All" for the whole library)
    #[serde(default = "default_group")]
    pub group: String,
    /// User field reserved for sync data
    #[serde(default = "default_sync_data_field")]
    pub sync_data_field: String,
    /// Directory holding attachment files
    pub attachment_path: Option<PathBuf>,
}

impl Default for BookendsConfig {
    fn default() -> Self {
        BookendsConfig {
            group: default_group(),
            sync_data_field: default_sync_data_field(),
            attachment_path: None,
        }
    }
}

fn default_group() -> String {
    "All".to_string()
}

fn default_sync_data_field() -> String {
    "user15".to_string()
}

impl Config {
    /// Path of the config file, if a config directory exists
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bibsync").join("config.toml"))
    }

    /// Load configuration from disk and the environment
    pub fn load() -> Result<Self> {
        // a .env next to the working directory is honored if present
        let _ = dotenvy::dotenv();

        let mut config = match Self::config_path().filter(|path| path.exists()) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Ok(key) = std::env::var("ZOTERO_API_KEY") {
            config.zotero.api_key = Some(key);
        }
        if let Ok(prefix) = std::env::var("ZOTERO_LIBRARY_PREFIX") {
            config.zotero.prefix = Some(prefix);
        }
        if let Ok(path) = std::env::var("BOOKENDS_ATTACHMENT_PATH") {
            config.bookends.attachment_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }
}
