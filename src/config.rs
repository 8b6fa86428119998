// Configuration File Support
//
// This module provides configuration file parsing for the SwearJar service.
// Supports TOML format with environment variable overrides.
// Configuration files are loaded from XDG config directory: ~/.config/swearjar/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rate_limit::RateLimitConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// HTTP listener configuration
    pub server: ServerConfig,

    /// Admission limits
    pub rate_limit: RateLimitConfig,

    /// Live connection keepalive
    pub connection: ConnectionConfig,

    /// Counter storage
    pub store: StoreConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,

    /// Shared secret required on every request; `None` disables the check
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            api_key: None,
        }
    }
}

/// Live connection keepalive configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Close a subscription after this long without any inbound frame
    pub idle_timeout_secs: u64,

    /// How often subscribers are pinged
    pub ping_interval_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30,
            ping_interval_secs: 10,
        }
    }
}

impl ConnectionConfig {
    /// Idle timeout as a duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Ping interval as a duration
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// Counter storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: String,

    /// Keep the counter in memory only
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "swears-db.sqlite".to_string(),
            in_memory: false,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to serve Prometheus metrics
    pub enabled: bool,

    /// Port for metrics server
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// If the config file does not exist, returns default configuration
    /// (with environment overrides applied).
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;

            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;

            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/swearjar/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "swearjar", "SwearJar") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("swearjar").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - SWEARJAR_LOG_LEVEL
    /// - SWEARJAR_LOG_FORMAT
    /// - SWEARJAR_BIND
    /// - SWEARJAR_API_KEY
    /// - SWEARJAR_DB_PATH
    /// - SWEARJAR_IDLE_TIMEOUT_SECS
    /// - SWEARJAR_METRICS_ENABLED
    /// - SWEARJAR_METRICS_PORT
    /// - rate limit variables (see [`RateLimitConfig::apply_overrides`])
    fn apply_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` (see [`Self::apply_env_overrides`])
    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("SWEARJAR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SWEARJAR_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(bind) = lookup("SWEARJAR_BIND") {
            self.server.bind = bind;
        }
        if let Some(key) = lookup("SWEARJAR_API_KEY") {
            if !key.is_empty() {
                self.server.api_key = Some(key);
            }
        }

        if let Some(path) = lookup("SWEARJAR_DB_PATH") {
            self.store.path = path;
        }

        if let Some(idle) = lookup("SWEARJAR_IDLE_TIMEOUT_SECS") {
            if let Ok(idle) = idle.parse::<u64>() {
                if idle > 0 {
                    self.connection.idle_timeout_secs = idle;
                }
            }
        }

        if let Some(enabled) = lookup("SWEARJAR_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }
        if let Some(port) = lookup("SWEARJAR_METRICS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.metrics.port = port;
            }
        }

        self.rate_limit = self.rate_limit.apply_overrides(&lookup);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        self.bind_addr()?;

        if self.connection.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be > 0 seconds");
        }
        if self.connection.ping_interval_secs == 0
            || self.connection.ping_interval_secs >= self.connection.idle_timeout_secs
        {
            anyhow::bail!("Ping interval must be > 0 and shorter than the idle timeout");
        }

        if !self.store.in_memory && self.store.path.trim().is_empty() {
            anyhow::bail!("Store path must not be empty");
        }

        if self.metrics.port == 0 {
            anyhow::bail!("Metrics port must be > 0");
        }

        self.rate_limit.validate()?;

        Ok(())
    }

    /// Parsed listener address
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind))
    }
}
