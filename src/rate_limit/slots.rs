//! Connection Slot Counter
//!
//! Fixed-capacity count of concurrently open subscriptions per identity.

use std::collections::HashMap;

/// Open-subscription counts keyed by identity.
///
/// Zero-valued entries are never stored.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSlots {
    counts: HashMap<String, u32>,
}

impl ConnectionSlots {
    /// Create an empty slot table
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a slot for `identity` if fewer than `capacity` are in use
    pub fn try_acquire(&mut self, identity: &str, capacity: u32) -> bool {
        let current = self.counts.get(identity).copied().unwrap_or(0);
        if current >= capacity {
            return false;
        }
        self.counts.insert(identity.to_string(), current + 1);
        true
    }

    /// Return a slot for `identity`, dropping the entry when it reaches zero
    ///
    /// Releasing an identity with no tracked slots is a no-op.
    pub fn release(&mut self, identity: &str) {
        match self.counts.get_mut(identity) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(identity);
            }
            None => {}
        }
    }

    /// Slots currently held by `identity`
    pub fn in_use(&self, identity: &str) -> u32 {
        self.counts.get(identity).copied().unwrap_or(0)
    }

    /// Number of identities holding at least one slot
    pub fn identities(&self) -> usize {
        self.counts.len()
    }

    /// Forget every held slot
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}
