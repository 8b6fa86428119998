//! Structured logging setup
//!
//! One global `tracing` subscriber, installed at startup. `RUST_LOG` takes
//! precedence over the configured level.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Level to log at: `--verbose` forces DEBUG, otherwise the configured level
pub fn level_for(config: &LoggingConfig, verbose: bool) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config.level.to_lowercase().parse().unwrap_or(Level::INFO)
}

/// Filter honouring `RUST_LOG` with `level` as the default directive
pub fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = filter_for(level_for(config, verbose));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
