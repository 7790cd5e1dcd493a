//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (~/.codesync/config.yaml, or an explicit path)
//! 3. Environment variables (CODESYNC_* prefix)
//! 4. CLI flags (handled by caller)

use crate::config::types::SyncConfig;
use crate::error::{Result, SyncError};
use crate::utils::default_config_dir;
use camino::{Utf8Path, Utf8PathBuf};
use std::env;
use std::fs;
use std::str::FromStr;

/// File name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Base directory searched for the default config file
    config_dir: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a loader rooted at ~/.codesync
    pub fn new() -> Self {
        let config_dir = default_config_dir().and_then(|p| Utf8PathBuf::from_path_buf(p).ok());
        Self { config_dir }
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir: Some(config_dir),
        }
    }

    /// Load configuration with hierarchical precedence.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(&self, path: Option<&Utf8Path>) -> Result<SyncConfig> {
        let mut config = SyncConfig::default();

        match path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(SyncError::invalid_config(format!(
                        "config file not found: {}",
                        explicit
                    )));
                }
                config = self.load_yaml_file(explicit)?;
            }
            None => {
                if let Some(default_path) = self.default_config_path() {
                    if default_path.exists() {
                        tracing::debug!("Loading config from {}", default_path);
                        config = self.load_yaml_file(&default_path)?;
                    }
                }
            }
        }

        self.apply_env_overrides(config)
    }

    /// Path of the default config file, if a config directory is known
    pub fn default_config_path(&self) -> Option<Utf8PathBuf> {
        self.config_dir.as_ref().map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Load a YAML file and parse it
    fn load_yaml_file(&self, path: &Utf8Path) -> Result<SyncConfig> {
        let content = fs::read_to_string(path)?;
        let config: SyncConfig = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: SyncConfig) -> Result<SyncConfig> {
        if let Some(port) = parse_env::<u16>("CODESYNC_PORT")? {
            config.network.port = port;
        }

        if let Ok(val) = env::var("CODESYNC_BIND_ADDRESS") {
            config.network.bind_address = val;
        }

        if let Some(secs) = parse_env::<u64>("CODESYNC_REQUEST_TIMEOUT_SECS")? {
            config.network.request_timeout_secs = secs;
        }

        if let Some(secs) = parse_env::<u64>("CODESYNC_SHUTDOWN_GRACE_SECS")? {
            config.network.shutdown_grace_secs = secs;
        }

        if let Some(include) = parse_env::<bool>("CODESYNC_INCLUDE_EXTENSIONS")? {
            config.transfer.include_extensions = include;
        }

        if let Some(level) = parse_env::<u32>("CODESYNC_COMPRESSION_LEVEL")? {
            config.transfer.compression_level = level;
        }

        config.transfer.compression_level = config.transfer.compression_level.clamp(1, 9);

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}
