//! SwearJar Library
//!
//! This library provides the core of the SwearJar service: per-client rate
//! limiting, a persisted swear counter whose mutations are applied atomically,
//! and real-time fan-out of every change to WebSocket subscribers priced at
//! their own multiplier.

pub mod broadcast;
pub mod config;
pub mod cost;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod metrics;
pub mod metrics_server;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod store;

pub use config::Config;
pub use cost::{Delta, PriceMultiplier, Tally};
pub use error::{FatalError, SwearError};
pub use gateway::MutationGateway;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use registry::{ConnectionRegistry, SubscriptionGuard};
pub use store::{CounterStore, MemoryCounterStore, SqliteCounterStore};
