//! Rate Limiting Module
//!
//! This module provides per-identity admission control for the service:
//!
//! - Sliding-window request counting for the stateless HTTP API
//! - Fixed-capacity connection slots for live WebSocket subscriptions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 RateLimiter                  │
//! ├─────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │ RequestWindow   │  │ ConnectionSlots  │  │
//! │  │ (per identity)  │  │ (per identity)   │  │
//! │  └─────────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod limiter;
pub mod slots;
pub mod window;

pub use config::RateLimitConfig;
pub use limiter::RateLimiter;
pub use slots::ConnectionSlots;
pub use window::RequestWindow;
