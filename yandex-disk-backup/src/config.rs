//! Configuration management for the backup agent.
//!
//! Loads configuration from TOML file with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::disk::client::DEFAULT_API_URL;
use crate::utils::errors::{AgentError, Result};

/// Environment variable that overrides `disk.token`
pub const TOKEN_ENV: &str = "YANDEX_DISK_TOKEN";

pub const DEFAULT_BACKUP_FOLDER: &str = "/Home Assistant Backups";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub disk: DiskConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskConfig {
    /// OAuth token pasted by the user
    #[serde(default)]
    pub token: String,

    /// Remote folder holding the archives and their metadata files
    #[serde(default = "default_backup_folder")]
    pub backup_folder: String,

    /// Yandex Disk REST API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// HTTP listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_backup_folder() -> String {
    DEFAULT_BACKUP_FOLDER.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9990
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DiskConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            backup_folder: default_backup_folder(),
            api_url: default_api_url(),
        }
    }

    /// Identity of this configuration: the first 8 characters of the token.
    pub fn unique_id(&self) -> String {
        self.token.chars().take(8).collect()
    }

    /// Check the token and normalize the backup folder in place.
    pub fn validate(&mut self) -> Result<()> {
        self.token = self.token.trim().to_string();
        if self.token.is_empty() {
            return Err(AgentError::Config(format!(
                "disk.token is empty (set it in the config file or {TOKEN_ENV})"
            )));
        }

        self.backup_folder = normalize_folder(&self.backup_folder)?;
        Ok(())
    }
}

/// Strip the `disk:` scheme and trailing slashes; require an absolute,
/// non-root path.
fn normalize_folder(folder: &str) -> Result<String> {
    let trimmed = folder.trim();
    let path = trimmed.strip_prefix("disk:").unwrap_or(trimmed);

    if !path.starts_with('/') {
        return Err(AgentError::Config(format!(
            "backup folder must be an absolute path: {folder}"
        )));
    }

    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return Err(AgentError::Config(
            "backup folder cannot be the disk root".to_string(),
        ));
    }

    Ok(path.to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disk: DiskConfig::new(""),
            agent: AgentConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, apply the token override from
    /// the environment and validate.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::load(Some(path))
    }

    /// Like [`Config::from_file`]; without a file the defaults are used and
    /// the token must come from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    AgentError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };

        config.apply_token_override(std::env::var(TOKEN_ENV).ok());
        config.disk.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AgentError::Config(e.to_string()))
    }

    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.disk.token = token;
        }
    }
}
