//! Config file loading
//!
//! `drift.toml` supplies defaults for the connection and path options;
//! command line flags override file values. A missing default file is fine,
//! an explicitly requested file that cannot be read is not.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "drift.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub redis: RedisSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    /// Root directory holding `<user>/files` trees
    pub storage_root: PathBuf,
    /// Directory holding the cache database
    pub cache_dir: PathBuf,
    /// Path format after the prefix is stripped
    pub format: String,
    /// Prefix stripped from incoming paths; storage root when unset
    pub prefix: Option<String>,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("data"),
            cache_dir: PathBuf::from("cache"),
            format: "/$user/files/$path".to_string(),
            prefix: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `drift.toml` when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}
