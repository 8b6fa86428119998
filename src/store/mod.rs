//! Counter Storage
//!
//! The counter is only ever changed through [`CounterStore::apply_delta`],
//! which applies a signed delta atomically and refuses any change that would
//! leave the count negative. That check is the store's responsibility; callers
//! never pre-check the current value.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCounterStore;
pub use sqlite::SqliteCounterStore;


/// Storage failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite reported an error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The single counter row is missing
    #[error("Counter row is missing")]
    MissingRow,

    /// A stored value violates the non-negative invariant
    #[error("Stored count {0} is negative")]
    Corrupt(i64),

    /// The connection lock was poisoned by a panicking writer
    #[error("Counter store lock poisoned")]
    Poisoned,

    /// The blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Largest count the store will hold (integers stay exact in `f64` costs)
pub const MAX_COUNT: i64 = 9_007_199_254_740_991;

/// Result of a bounded delta application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The delta was applied; carries the new count
    Applied(i64),
    /// `count + delta` would be negative; carries the unchanged count
    Underflow(i64),
    /// `count + delta` would exceed [`MAX_COUNT`]; carries the unchanged count
    Overflow(i64),
}

impl ApplyOutcome {
    /// Refusal of `delta` against `count`, classified by direction
    pub fn refused(count: i64, delta: i64) -> Self {
        if delta < 0 {
            Self::Underflow(count)
        } else {
            Self::Overflow(count)
        }
    }

    /// Count after the call
    pub fn count(self) -> i64 {
        match self {
            Self::Applied(count) | Self::Underflow(count) | Self::Overflow(count) => count,
        }
    }

    /// Whether the delta was applied
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Atomic counter storage
///
/// Implementations may block; async callers run them on the blocking pool.
pub trait CounterStore: Send + Sync + 'static {
    /// Read the current count
    fn read(&self) -> Result<i64, StoreError>;

    /// Apply `delta` unless `count + delta` leaves `0..=MAX_COUNT`
    fn apply_delta(&self, delta: i64) -> Result<ApplyOutcome, StoreError>;

    /// Set the count to zero
    fn reset(&self) -> Result<(), StoreError>;
}
