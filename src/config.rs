//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::connection::PayloadFormat;
use crate::store::DEFAULT_MUTATION_FIELD;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard socket configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default)]
    pub format: PayloadFormat,
}

fn default_url() -> String {
    "ws://localhost:8089/ws".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            format: PayloadFormat::default(),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,

    /// Payload field naming the target slot; `None` or `""` disables it
    #[serde(default = "default_mutation_field")]
    pub mutation_field: Option<String>,
}

/// A domain slot and its placeholder value
#[derive(Debug, Clone, Deserialize)]
pub struct SlotConfig {
    pub name: String,

    #[serde(default)]
    pub default: Value,
}

fn default_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig {
            name: "hostList".to_string(),
            default: Value::Array(Vec::new()),
        },
        SlotConfig {
            name: "stats".to_string(),
            default: Value::Object(Default::default()),
        },
    ]
}

fn default_mutation_field() -> Option<String> {
    Some(DEFAULT_MUTATION_FIELD.to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            mutation_field: default_mutation_field(),
        }
    }
}

/// Demo feed server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_interval")]
    pub interval_ms: u64,

    #[serde(default = "default_max_ticks")]
    pub max_ticks: usize,

    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8089".to_string()
}

fn default_interval() -> u64 {
    2000 // 2 seconds
}

fn default_max_ticks() -> usize {
    30
}

fn default_hosts() -> Vec<String> {
    vec![
        "10.0.1.10".to_string(),
        "10.0.1.11".to_string(),
        "10.0.2.10".to_string(),
    ]
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            interval_ms: default_interval(),
            max_ticks: default_max_ticks(),
            hosts: default_hosts(),
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

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
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
            dirs::config_dir().map(|p| p.join("lbdash").join("config.toml")),
            Some(PathBuf::from("/etc/lbdash/config.toml")),
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
        // Connection overrides
        if let Ok(url) = std::env::var("LBDASH_URL") {
            self.connection.url = url;
        }
        if let Ok(format) = std::env::var("LBDASH_FORMAT") {
            match format.parse() {
                Ok(f) => self.connection.format = f,
                Err(e) => tracing::warn!("Ignoring LBDASH_FORMAT: {}", e),
            }
        }

        // Feed overrides
        if let Ok(bind) = std::env::var("LBDASH_FEED_BIND") {
            self.feed.bind = bind;
        }
        if let Ok(interval) = std::env::var("LBDASH_FEED_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.feed.interval_ms = ms;
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LBDASH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LBDASH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject configurations the store cannot be built from
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for slot in &self.store.slots {
            if slot.name.is_empty() {
                return Err(ConfigError::Invalid("slot name must not be empty".to_string()));
            }
            if !seen.insert(slot.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate slot: {}", slot.name)));
            }
        }

        if self.feed.max_ticks == 0 {
            return Err(ConfigError::Invalid("feed.max_ticks must be at least 1".to_string()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# lbdash Configuration
#
# Environment variables override these settings:
# - LBDASH_URL
# - LBDASH_FORMAT
# - LBDASH_FEED_BIND
# - LBDASH_FEED_INTERVAL_MS
# - LBDASH_LOG_LEVEL
# - LBDASH_LOG_FORMAT

[connection]
# Balancer UI websocket endpoint
url = "ws://localhost:8089/ws"

# Payload format: json or raw
format = "json"

[store]
# Payload field whose value names the slot to overwrite ("" disables)
mutation_field = "mutation"

[[store.slots]]
name = "hostList"
default = []

[[store.slots]]
name = "stats"
default = {}

[feed]
# Demo feed server address
bind = "0.0.0.0:8089"

# How often a stats tick is pushed (ms)
interval_ms = 2000

# Length of the rolling stats window
max_ticks = 30

# Simulated router hosts
hosts = ["10.0.1.10", "10.0.1.11", "10.0.2.10"]

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
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.connection.url, "ws://localhost:8089/ws");
        assert_eq!(config.connection.format, PayloadFormat::Json);
        assert_eq!(config.store.slots.len(), 2);
        assert_eq!(config.store.mutation_field.as_deref(), Some("mutation"));
        assert_eq!(config.feed.interval_ms, 2000);
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.store.slots[0].name, "hostList");
        assert_eq!(config.store.slots[0].default, json!([]));
        assert_eq!(config.store.slots[1].default, json!({}));
        assert_eq!(config.feed.hosts.len(), 3);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[connection]
url = "ws://balancer:9000/ws"
format = "raw"

[[store.slots]]
name = "alerts"
default = {{ count = 0 }}
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.connection.url, "ws://balancer:9000/ws");
        assert_eq!(config.connection.format, PayloadFormat::Raw);
        assert_eq!(config.store.slots.len(), 1);
        assert_eq!(config.store.slots[0].default, json!({"count": 0}));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_duplicate_slots_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[store.slots]]
name = "stats"

[[store.slots]]
name = "stats"
"#
        )
        .unwrap();

        let result = Config::load(file.path());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/lbdash.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
