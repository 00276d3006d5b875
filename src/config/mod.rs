//! Configuration management for search-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::encoder::DEFAULT_DISCARD_FIELDS;
use crate::export::pagination::DEFAULT_PAGE_SIZE;
use crate::export::{ExportOptions, FailurePolicy, XmlEncoder};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Account service configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Search service configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Export behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Account service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base URL of the account service
    #[serde(default = "default_network_url")]
    pub url: String,

    /// Account identifier
    #[serde(default)]
    pub identifier: Option<String>,

    /// Account key
    #[serde(default)]
    pub key: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,
}

/// Search service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL; index `X` lives at `<url>/X/`
    #[serde(default = "default_search_url")]
    pub url: String,

    /// Rows requested per query
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout: u64,
}

/// Export behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Staging directory (defaults to the destination)
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,

    /// Fields never written to the XML output
    #[serde(default = "default_discard_fields")]
    pub discard_fields: Vec<String>,

    /// Publish `.tar.gz` archives instead of individual files
    #[serde(default)]
    pub compressed: bool,

    /// What to do when an index fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Create missing destination and staging directories
    #[serde(default = "default_create_destination")]
    pub create_destination: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_network_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_network_timeout() -> u64 {
    30
}

fn default_search_url() -> String {
    "http://localhost:8983/solr".to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_search_timeout() -> u64 {
    60
}

fn default_discard_fields() -> Vec<String> {
    DEFAULT_DISCARD_FIELDS.iter().map(|s| s.to_string()).collect()
}

fn default_create_destination() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: default_network_url(),
            identifier: None,
            key: None,
            timeout: default_network_timeout(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: default_search_url(),
            page_size: default_page_size(),
            timeout: default_search_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            staging_dir: None,
            discard_fields: default_discard_fields(),
            compressed: false,
            failure_policy: FailurePolicy::default(),
            create_destination: default_create_destination(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

/// Environment variables overriding file values
pub const ENV_NETWORK_URL: &str = "SEARCH_EXPORT_NETWORK_URL";
pub const ENV_NETWORK_ID: &str = "SEARCH_EXPORT_NETWORK_ID";
pub const ENV_NETWORK_KEY: &str = "SEARCH_EXPORT_NETWORK_KEY";
pub const ENV_SEARCH_URL: &str = "SEARCH_EXPORT_SEARCH_URL";

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load from `path`, or the default location when `None`
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Load from the default file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file(None)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_NETWORK_URL) {
            self.network.url = url;
        }
        if let Some(id) = lookup(ENV_NETWORK_ID) {
            self.network.identifier = Some(id);
        }
        if let Some(key) = lookup(ENV_NETWORK_KEY) {
            self.network.key = Some(key);
        }
        if let Some(url) = lookup(ENV_SEARCH_URL) {
            self.search.url = url;
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".search-export")
            .join("config.toml")
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.page_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.search.url.trim().is_empty() {
            return Err(ConfigError::MissingField("search.url".to_string()).into());
        }
        if self.network.url.trim().is_empty() {
            return Err(ConfigError::MissingField("network.url".to_string()).into());
        }
        if self.export.discard_fields.iter().any(|f| f == "id") {
            return Err(ConfigError::InvalidValue {
                field: "export.discard_fields".to_string(),
                value: "id".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Options for the export coordinator
    pub fn export_options(&self, show_progress: bool) -> ExportOptions {
        ExportOptions {
            page_size: self.search.page_size,
            compressed: self.export.compressed,
            failure_policy: self.export.failure_policy,
            show_progress,
            encoder: XmlEncoder::new(self.export.discard_fields.iter().cloned()),
        }
    }
}

impl NetworkConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl SearchConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
