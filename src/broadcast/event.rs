//! Change events emitted by the mutation gateway.

/// The counter changed
///
/// Carries the raw stored value; the pipeline checks it before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Counter value after the mutation
    pub count: i64,
}

impl ChangeEvent {
    /// Event for a counter now at `count`
    pub fn new(count: i64) -> Self {
        Self { count }
    }

    /// Event for a reset counter
    pub fn reset() -> Self {
        Self { count: 0 }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Payloads handed to open subscriptions
    pub delivered: usize,
    /// Registered subscriptions found with a closed handle and removed
    pub pruned: usize,
}
