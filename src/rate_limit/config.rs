//! Rate Limit Configuration
//!
//! Configuration for request and connection admission.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default admission limits
pub const DEFAULT_REQUEST_LIMIT: u32 = 30; // requests per window
pub const DEFAULT_WINDOW_MS: u64 = 60_000; // trailing window
pub const DEFAULT_CONNECTION_LIMIT: u32 = 2; // live subscriptions per identity
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Rate limit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,

    /// Requests admitted per identity within one window
    pub request_limit: u32,

    /// Length of the sliding request window in milliseconds
    pub window_ms: u64,

    /// Concurrent subscriptions admitted per identity
    pub connection_limit: u32,

    /// How often expired request windows are purged
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_limit: DEFAULT_REQUEST_LIMIT,
            window_ms: DEFAULT_WINDOW_MS,
            connection_limit: DEFAULT_CONNECTION_LIMIT,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

impl RateLimitConfig {
    /// Apply `SWEARJAR_*` overrides read through `lookup`
    ///
    /// Unparsable values are ignored.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SWEARJAR_RATE_LIMIT_ENABLED") {
            self.enabled = val.parse().unwrap_or(self.enabled);
        }

        if let Some(val) = lookup("SWEARJAR_REQUEST_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.request_limit = limit;
            }
        }

        if let Some(val) = lookup("SWEARJAR_REQUEST_WINDOW_MS") {
            if let Ok(window) = val.parse() {
                self.window_ms = window;
            }
        }

        if let Some(val) = lookup("SWEARJAR_CONNECTION_LIMIT") {
            if let Ok(limit) = val.parse() {
                self.connection_limit = limit;
            }
        }

        self
    }

    /// Get the sweep interval as a duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Disable rate limiting (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Validate the limits
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.request_limit == 0 {
            anyhow::bail!("Request limit must be > 0");
        }
        if self.window_ms == 0 {
            anyhow::bail!("Request window must be > 0 ms");
        }
        if self.connection_limit == 0 {
            anyhow::bail!("Connection limit must be > 0");
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("Sweep interval must be > 0 seconds");
        }
        Ok(())
    }
}
