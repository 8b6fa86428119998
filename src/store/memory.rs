//! In-memory counter store backed by a single atomic.

use std::sync::atomic::{AtomicI64, Ordering};

use super::{ApplyOutcome, CounterStore, StoreError, MAX_COUNT};

/// Volatile counter store
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    count: AtomicI64,
}

impl MemoryCounterStore {
    /// Create a store starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store starting at `count`
    pub fn with_count(count: u64) -> Self {
        Self {
            count: AtomicI64::new(count as i64),
        }
    }
}

impl CounterStore for MemoryCounterStore {
    fn read(&self) -> Result<i64, StoreError> {
        Ok(self.count.load(Ordering::SeqCst))
    }

    fn apply_delta(&self, delta: i64) -> Result<ApplyOutcome, StoreError> {
        let result = self
            .count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current
                    .checked_add(delta)
                    .filter(|next| (0..=MAX_COUNT).contains(next))
            });

        Ok(match result {
            Ok(previous) => ApplyOutcome::Applied(previous + delta),
            Err(current) => ApplyOutcome::refused(current, delta),
        })
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.count.store(0, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_apply_delta() {
        let store = MemoryCounterStore::new();
        let outcome = store.apply_delta(3).unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied(3));
        assert_eq!(store.read().unwrap(), 3);
    }

    #[test]
    fn test_underflow_leaves_count_unchanged() {
        let store = MemoryCounterStore::with_count(1);
        let outcome = store.apply_delta(-2).unwrap();
        assert_eq!(outcome, ApplyOutcome::Underflow(1));
        assert_eq!(store.read().unwrap(), 1);
    }

    #[test]
    fn test_overflow_is_not_underflow() {
        let store = MemoryCounterStore::with_count((MAX_COUNT - 1) as u64);
        assert_eq!(store.apply_delta(5).unwrap(), ApplyOutcome::Overflow(MAX_COUNT - 1));
        assert_eq!(store.apply_delta(1).unwrap(), ApplyOutcome::Applied(MAX_COUNT));
        assert_eq!(store.read().unwrap(), MAX_COUNT);

        // i64 overflow is refused the same way
        assert_eq!(store.apply_delta(i64::MAX).unwrap(), ApplyOutcome::Overflow(MAX_COUNT));
    }

    #[test]
    fn test_reset() {
        let store = MemoryCounterStore::with_count(42);
        store.reset().unwrap();
        assert_eq!(store.read().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_decrements_never_go_negative() {
        let store = Arc::new(MemoryCounterStore::with_count(50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| store.apply_delta(-1).unwrap().is_applied())
                        .count()
                })
            })
            .collect();

        let applied: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(applied, 50);
        assert_eq!(store.read().unwrap(), 0);
    }
}
