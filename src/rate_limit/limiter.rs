//! Rate Limiter
//!
//! Central admission point for per-identity request and connection limits.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

use super::config::RateLimitConfig;
use super::slots::ConnectionSlots;
use super::window::RequestWindow;

/// Per-identity admission state
///
/// Both maps are private; every access goes through the methods below and
/// no lock is ever held across an `.await`.
#[derive(Debug)]
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,

    /// Sliding request windows
    windows: Mutex<HashMap<String, RequestWindow>>,

    /// Open connection slots
    slots: Mutex<ConnectionSlots>,

    /// Origin of the monotonic millisecond clock
    epoch: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            slots: Mutex::new(ConnectionSlots::new()),
            epoch: Instant::now(),
        }
    }

    /// Create with default configuration
    pub fn default_config() -> Self {
        Self::new(RateLimitConfig::default())
    }

    /// Create a disabled rate limiter (for testing)
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Get the configuration
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Milliseconds elapsed since this limiter was created
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Admit or reject a stateless request from `identity`
    pub fn admit_request(&self, identity: &str) -> bool {
        self.admit_request_at(identity, self.now_ms())
    }

    /// Admit or reject a request from `identity` observed at `now_ms`
    ///
    /// The capacity check uses the post-eviction, pre-insertion count, so
    /// exactly `request_limit` requests pass in any rolling window.
    pub fn admit_request_at(&self, identity: &str, now_ms: u64) -> bool {
        if !self.config.enabled {
            return true;
        }

        let mut windows = self.windows();
        let window = windows.entry(identity.to_string()).or_default();
        let admitted = window.try_admit(now_ms, self.config.window_ms, self.config.request_limit);
        if window.is_empty() {
            windows.remove(identity);
        }

        if !admitted {
            debug!(identity, "Request rejected by rate limiter");
        }

        admitted
    }

    /// Take a connection slot for `identity`
    pub fn admit_connection(&self, identity: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let admitted = self
            .slots()
            .try_acquire(identity, self.config.connection_limit);

        if !admitted {
            debug!(identity, "Connection rejected by rate limiter");
        }

        admitted
    }

    /// Return a connection slot for `identity`
    pub fn release_connection(&self, identity: &str) {
        if !self.config.enabled {
            return;
        }
        self.slots().release(identity);
    }

    /// Drop identities whose request windows have fully expired
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.now_ms())
    }

    /// Drop identities whose request windows have fully expired at `now_ms`
    pub fn sweep_at(&self, now_ms: u64) -> usize {
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|_, window| {
            window.evict(now_ms, self.config.window_ms);
            !window.is_empty()
        });
        before - windows.len()
    }

    /// Number of identities with a live request window
    pub fn tracked_identities(&self) -> usize {
        self.windows().len()
    }

    /// Connection slots currently held by `identity`
    pub fn open_connections(&self, identity: &str) -> u32 {
        self.slots().in_use(identity)
    }

    /// Reset all admission state
    pub fn clear(&self) {
        self.windows().clear();
        self.slots().clear();
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RequestWindow>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock still guards valid data.
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slots(&self) -> MutexGuard<'_, ConnectionSlots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_admits_exactly_capacity() {
        let limiter = RateLimiter::default_config();
        for _ in 0..30 {
            assert!(limiter.admit_request_at("api-test", 1_000));
        }
        assert!(!limiter.admit_request_at("api-test", 1_000));
    }

    #[test]
    fn test_one_more_after_oldest_ages_out() {
        let limiter = RateLimiter::default_config();

        assert!(limiter.admit_request_at("aging", 0));
        for i in 1..30 {
            assert!(limiter.admit_request_at("aging", 10_000 + i));
        }
        assert!(!limiter.admit_request_at("aging", 59_999));

        // The request at t=0 leaves the window at t=60_000
        assert!(limiter.admit_request_at("aging", 60_000));
        assert!(!limiter.admit_request_at("aging", 60_001));
    }

    #[test]
    fn test_identities_are_isolated() {
        let limiter = RateLimiter::default_config();
        for _ in 0..30 {
            limiter.admit_request_at("noisy", 5);
        }
        assert!(!limiter.admit_request_at("noisy", 5));
        assert!(limiter.admit_request_at("quiet", 5));
    }

    #[test]
    fn test_connection_slots() {
        let limiter = RateLimiter::default_config();
        assert!(limiter.admit_connection("ws-test"));
        assert!(limiter.admit_connection("ws-test"));
        assert!(!limiter.admit_connection("ws-test"));

        limiter.release_connection("ws-test");
        assert!(limiter.admit_connection("ws-test"));
        assert!(!limiter.admit_connection("ws-test"));
    }

    #[test]
    fn test_release_untracked_identity() {
        let limiter = RateLimiter::default_config();
        limiter.release_connection("never-connected");
        assert_eq!(limiter.open_connections("never-connected"), 0);
        assert!(limiter.admit_connection("never-connected"));
        assert_eq!(limiter.open_connections("never-connected"), 1);
    }

    #[test]
    fn test_sweep_removes_expired_identities() {
        let limiter = RateLimiter::default_config();
        limiter.admit_request_at("old", 0);
        limiter.admit_request_at("recent", 50_000);
        assert_eq!(limiter.tracked_identities(), 2);

        let removed = limiter.sweep_at(70_000);
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_rejected_identity_leaves_no_empty_window() {
        let limiter = RateLimiter::new(RateLimitConfig {
            request_limit: 0,
            ..RateLimitConfig::default()
        });

        assert!(!limiter.admit_request_at("nobody", 1_000));
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_disabled_allows_all() {
        let limiter = RateLimiter::disabled();
        for _ in 0..200 {
            assert!(limiter.admit_request_at("user", 1));
        }
        for _ in 0..10 {
            assert!(limiter.admit_connection("user"));
        }
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_clear() {
        let limiter = RateLimiter::default_config();
        limiter.admit_request("a");
        limiter.admit_connection("a");
        limiter.clear();
        assert_eq!(limiter.tracked_identities(), 0);
        assert_eq!(limiter.open_connections("a"), 0);
    }

    proptest! {
        // Over any arrival pattern no trailing window ever holds more than
        // `request_limit` admitted requests.
        #[test]
        fn prop_window_never_exceeds_capacity(gaps in prop::collection::vec(0u64..5_000, 1..200)) {
            let limiter = RateLimiter::default_config();
            let mut now = 0u64;
            let mut admitted: Vec<u64> = Vec::new();

            for gap in gaps {
                now += gap;
                if limiter.admit_request_at("prop", now) {
                    admitted.push(now);
                }
                let in_window = admitted.iter().filter(|&&t| t + 60_000 > now).count();
                prop_assert!(in_window <= 30);
            }
        }

        // A request is rejected only while the window is full.
        #[test]
        fn prop_rejects_only_when_full(gaps in prop::collection::vec(0u64..5_000, 1..200)) {
            let limiter = RateLimiter::default_config();
            let mut now = 0u64;
            let mut admitted: Vec<u64> = Vec::new();

            for gap in gaps {
                now += gap;
                let in_window = admitted.iter().filter(|&&t| t + 60_000 > now).count();
                let accepted = limiter.admit_request_at("prop", now);
                prop_assert_eq!(accepted, in_window < 30);
                if accepted {
                    admitted.push(now);
                }
            }
        }
    }
}
