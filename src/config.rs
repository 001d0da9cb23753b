//! Configuration management for Chatloom
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatloomError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Chatloom
///
/// Holds the chat proxy settings, storage location, title generation
/// behaviour and chat defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat proxy configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Chat history storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Automatic chat title generation
    #[serde(default)]
    pub title: TitleConfig,
    /// Interactive chat defaults
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Chat proxy configuration
///
/// The proxy accepts a list of role/parts messages and answers with plain
/// text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the chat proxy (e.g. `http://localhost:5173`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model requested from the proxy
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout (seconds)
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_model() -> String {
    "default".to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_seconds: default_provider_timeout(),
        }
    }
}

/// Chat history storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite history database; platform data dir when unset
    #[serde(default)]
    pub history_db: Option<PathBuf>,
}

/// Title generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleConfig {
    /// Whether to ask the proxy for a chat title
    #[serde(default = "default_title_enabled")]
    pub enabled: bool,

    /// Upper bound on a single title request (seconds)
    #[serde(default = "default_title_timeout")]
    pub timeout_seconds: u64,

    /// Minimum number of committed messages before a title is requested
    #[serde(default = "default_title_min_messages")]
    pub min_messages: usize,
}

fn default_title_enabled() -> bool {
    true
}

fn default_title_timeout() -> u64 {
    15
}

fn default_title_min_messages() -> usize {
    2
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            enabled: default_title_enabled(),
            timeout_seconds: default_title_timeout(),
            min_messages: default_title_min_messages(),
        }
    }
}

/// Interactive chat defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Characters attached to newly created chats
    #[serde(default)]
    pub character_ids: Vec<String>,

    /// Greeting placed in the root turn of new chats
    #[serde(default)]
    pub greeting: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line, for overrides
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Config` if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatloomError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatloomError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("CHATLOOM_PROXY_URL") {
            self.provider.base_url = base_url;
        }

        if let Ok(model) = std::env::var("CHATLOOM_MODEL") {
            self.provider.model = model;
        }

        if let Ok(timeout) = std::env::var("CHATLOOM_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATLOOM_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(db_path) = std::env::var("CHATLOOM_HISTORY_DB") {
            self.storage.history_db = Some(PathBuf::from(db_path));
        }

        if let Ok(enabled) = std::env::var("CHATLOOM_TITLE_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.title.enabled = true,
                "0" | "false" | "no" | "off" => self.title.enabled = false,
                _ => tracing::warn!("Invalid CHATLOOM_TITLE_ENABLED: {}", enabled),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(db_path) = &cli.storage_path {
            self.storage.history_db = Some(PathBuf::from(db_path));
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.provider.base_url).map_err(|e| {
            ChatloomError::Config(format!(
                "provider.base_url is not a valid URL ({}): {}",
                self.provider.base_url, e
            ))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ChatloomError::Config(format!(
                "provider.base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }

        if self.provider.model.trim().is_empty() {
            return Err(ChatloomError::Config("provider.model cannot be empty".to_string()).into());
        }

        if self.provider.timeout_seconds == 0 {
            return Err(ChatloomError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.title.timeout_seconds == 0 {
            return Err(ChatloomError::Config(
                "title.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.title.min_messages == 0 {
            return Err(ChatloomError::Config(
                "title.min_messages must be at least 1".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
