//! Sliding Window Request Log
//!
//! Per-identity record of admitted request timestamps within a trailing
//! window.

use std::collections::VecDeque;

/// Admitted request timestamps (monotonic milliseconds) for one identity.
///
/// Timestamps are appended in non-decreasing order, so eviction only ever
/// pops from the front.
#[derive(Debug, Clone, Default)]
pub struct RequestWindow {
    timestamps: VecDeque<u64>,
}

impl RequestWindow {
    /// Create an empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every timestamp at or before `now_ms - window_ms`
    pub fn evict(&mut self, now_ms: u64, window_ms: u64) {
        let Some(window_start) = now_ms.checked_sub(window_ms) else {
            return;
        };
        while let Some(&oldest) = self.timestamps.front() {
            if oldest > window_start {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Evict, then record `now_ms` if fewer than `capacity` remain
    ///
    /// Returns true if the request was admitted. A rejected request is not
    /// recorded.
    pub fn try_admit(&mut self, now_ms: u64, window_ms: u64, capacity: u32) -> bool {
        self.evict(now_ms, window_ms);

        if self.timestamps.len() >= capacity as usize {
            return false;
        }

        self.timestamps.push_back(now_ms);
        true
    }

    /// Number of timestamps currently recorded
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether no timestamps are recorded
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
