//! Configuration management
//!
//! This module handles loading and parsing configuration for the bizmap service.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Photo upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Company search configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/bizmap.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Photo upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory photos are written to
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed image MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("data/photos")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/gif".to_string(),
        "image/webp".to_string(),
    ]
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/bmp" => "bmp",
            "image/tiff" => "tiff",
            _ => "bin",
        }
    }
}

/// Company search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// IANA time zone business hours are interpreted in
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Upper bound for a single search, in milliseconds
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            timeout_ms: default_search_timeout_ms(),
        }
    }
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_search_timeout_ms() -> u64 {
    5000
}

impl SearchConfig {
    /// Parse the configured time zone
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!("Unknown time zone: {}", self.timezone))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_lifetime_days")]
    pub lifetime_days: i64,
    /// Interval between expired-session sweeps, in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_days: default_session_lifetime_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

fn default_session_lifetime_days() -> i64 {
    14
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - BIZMAP_SERVER_HOST
    /// - BIZMAP_SERVER_PORT
    /// - BIZMAP_SERVER_CORS_ORIGIN
    /// - BIZMAP_DATABASE_DRIVER
    /// - BIZMAP_DATABASE_URL
    /// - BIZMAP_UPLOAD_PATH
    /// - BIZMAP_SEARCH_TIMEZONE
    /// - BIZMAP_SEARCH_TIMEOUT_MS
    /// - BIZMAP_SESSION_LIFETIME_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.tz()?;
        if self.session.lifetime_days <= 0 {
            return Err(ConfigError::ValidationError(
                "session.lifetime_days must be positive".to_string(),
            ));
        }
        if self.session.cleanup_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.cleanup_interval_secs must be positive".to_string(),
            ));
        }
        if self.search.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "search.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("BIZMAP_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("BIZMAP_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("BIZMAP_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("BIZMAP_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("BIZMAP_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("BIZMAP_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }

        // Search configuration
        if let Ok(timezone) = std::env::var("BIZMAP_SEARCH_TIMEZONE") {
            self.search.timezone = timezone;
        }
        if let Ok(timeout) = std::env::var("BIZMAP_SEARCH_TIMEOUT_MS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.search.timeout_ms = timeout;
            }
        }

        if let Ok(days) = std::env::var("BIZMAP_SESSION_LIFETIME_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.lifetime_days = days;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches process environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn valid_server_config_strategy() -> impl Strategy<Value = ServerConfig> {
        (
            prop_oneof![Just("0.0.0.0".to_string()), Just("127.0.0.1".to_string())],
            1024u16..65535,
        )
            .prop_map(|(host, port)| ServerConfig {
                host,
                port,
                cors_origin: default_cors_origin(),
            })
    }

    fn valid_search_config_strategy() -> impl Strategy<Value = SearchConfig> {
        (
            prop_oneof![
                Just("UTC".to_string()),
                Just("Europe/Paris".to_string()),
                Just("America/New_York".to_string()),
            ],
            1u64..60_000,
        )
            .prop_map(|(timezone, timeout_ms)| SearchConfig {
                timezone,
                timeout_ms,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back preserves it.
        #[test]
        fn config_yaml_roundtrip(
            server in valid_server_config_strategy(),
            search in valid_search_config_strategy(),
            lifetime_days in 1i64..90,
        ) {
            let config = Config {
                server,
                search,
                session: SessionConfig { lifetime_days, ..SessionConfig::default() },
                ..Config::default()
            };

            let yaml = serde_yaml::to_string(&config).unwrap();
            let file = tempfile::NamedTempFile::new().unwrap();
            std::fs::write(file.path(), yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.server.host, config.server.host);
            prop_assert_eq!(loaded.server.port, config.server.port);
            prop_assert_eq!(loaded.search.timezone, config.search.timezone);
            prop_assert_eq!(loaded.search.timeout_ms, config.search.timeout_ms);
            prop_assert_eq!(loaded.session.lifetime_days, lifetime_days);
        }
    }
}
