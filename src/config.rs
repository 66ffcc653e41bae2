//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub querier: QuerierConfig,

    #[serde(default)]
    pub table_manager: TableManagerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Querier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QuerierConfig {
    /// Tenant used when a caller does not supply one (CLI only)
    #[serde(default)]
    pub tenant: Option<String>,

    /// Default lookback of a query window, in hours
    #[serde(default = "default_query_window")]
    pub query_window_hours: u64,

    /// Per-request timeout passed down to the chunk store
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_query_window() -> u64 {
    12
}

fn default_query_timeout() -> u64 {
    30
}

impl Default for QuerierConfig {
    fn default() -> Self {
        Self {
            tenant: None,
            query_window_hours: default_query_window(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}

/// Table manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TableManagerConfig {
    #[serde(default = "default_read_throughput")]
    pub provisioned_read_throughput: i64,

    #[serde(default = "default_write_throughput")]
    pub provisioned_write_throughput: i64,
}

fn default_read_throughput() -> i64 {
    300
}

fn default_write_throughput() -> i64 {
    3000
}

impl Default for TableManagerConfig {
    fn default() -> Self {
        Self {
            provisioned_read_throughput: default_read_throughput(),
            provisioned_write_throughput: default_write_throughput(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chunkquery").join("config.toml")),
            Some(PathBuf::from("/etc/chunkquery/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(tenant) = std::env::var("CHUNKQUERY_TENANT") {
            self.querier.tenant = Some(tenant);
        }
        if let Ok(hours) = std::env::var("CHUNKQUERY_QUERY_WINDOW_HOURS") {
            if let Ok(h) = hours.parse() {
                self.querier.query_window_hours = h;
            }
        }
        if let Ok(secs) = std::env::var("CHUNKQUERY_QUERY_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.querier.query_timeout_secs = s;
            }
        }

        if let Ok(level) = std::env::var("CHUNKQUERY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CHUNKQUERY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chunkquery Configuration
#
# Environment variables override these settings:
# - CHUNKQUERY_TENANT
# - CHUNKQUERY_QUERY_WINDOW_HOURS
# - CHUNKQUERY_QUERY_TIMEOUT_SECS
# - CHUNKQUERY_LOG_LEVEL
# - CHUNKQUERY_LOG_FORMAT

[querier]
# Tenant used by the CLI when none is given
# tenant = "userID"

# Lookback of the default query window (hours)
query_window_hours = 12

# Timeout handed to the chunk store per request (seconds)
query_timeout_secs = 30

[table_manager]
# Throughput provisioned for tables created by sync
provisioned_read_throughput = 300
provisioned_write_throughput = 3000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.querier.query_window_hours, 12);
        assert_eq!(config.querier.tenant, None);
        assert_eq!(config.table_manager.provisioned_write_throughput, 3000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.querier.query_timeout_secs, 30);
        assert_eq!(config.table_manager.provisioned_read_throughput, 300);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = Config::parse("[querier]\ntenant = \"team-a\"\n").unwrap();
        assert_eq!(config.querier.tenant.as_deref(), Some("team-a"));
        assert_eq!(config.querier.query_window_hours, 12);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"debug\"\nformat = \"json\"").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/nonexistent/chunkquery.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[querier\nbroken").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
