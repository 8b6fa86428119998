//! Mutation Gateway
//!
//! Validates counter requests, applies them through the [`CounterStore`],
//! and hands every successful change to the broadcast pipeline before
//! returning.
//!
//! # Ordering
//!
//! A sequencing lock is held from the store write until the pipeline has
//! issued the resulting event to every subscriber. Mutation N is therefore
//! fully dispatched before mutation N+1's call returns, and subscribers see
//! counts in the same order the store applied them. The lock orders events
//! only; the range guard is the store's own conditional update.
//!
//! Store calls may block (SQLite waits on its busy timeout), so every one
//! runs on the blocking pool via `spawn_blocking`.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::broadcast::{ChangeEvent, PipelineHandle};
use crate::cost::{Delta, PriceMultiplier, Tally};
use crate::error::{Result, SwearError};
use crate::metrics;
use crate::store::{ApplyOutcome, CounterStore, StoreError};

/// Entry point for every read, mutation, and reset of the counter
pub struct MutationGateway {
    store: Arc<dyn CounterStore>,
    pipeline: PipelineHandle,
    sequencer: Mutex<()>,
}

impl std::fmt::Debug for MutationGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationGateway")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl MutationGateway {
    /// Create a gateway over `store` publishing to `pipeline`
    pub fn new(store: Arc<dyn CounterStore>, pipeline: PipelineHandle) -> Self {
        Self {
            store,
            pipeline,
            sequencer: Mutex::new(()),
        }
    }

    /// Validate and execute a request against the counter
    ///
    /// The price is checked first, then the delta. `None` reads without
    /// writing; any present delta, including zero, is a confirmed write that
    /// is broadcast.
    pub async fn apply(&self, delta: Option<f64>, price: f64) -> Result<Tally> {
        let price = PriceMultiplier::new(price)?;
        match delta.map(Delta::new).transpose()? {
            Some(delta) => self.mutate(delta, price).await,
            None => self.read(price).await,
        }
    }

    /// Current count priced at `price`
    pub async fn read(&self, price: PriceMultiplier) -> Result<Tally> {
        let count = checked_count(self.with_store(|store| store.read()).await?)?;
        let tally = Tally::priced(count, price);
        debug!(
            "Swears Data - count: {}, pricePerSwear: {}, cost: {}",
            tally.count,
            price.get(),
            tally.cost
        );
        Ok(tally)
    }

    /// Apply `delta` and broadcast the new count
    pub async fn mutate(&self, delta: Delta, price: PriceMultiplier) -> Result<Tally> {
        let _turn = self.sequencer.lock().await;

        let by = delta.get();
        let stored = match self.with_store(move |store| store.apply_delta(by)).await? {
            ApplyOutcome::Applied(count) => count,
            ApplyOutcome::Underflow(count) => {
                metrics::MUTATIONS_TOTAL.with_label_values(&["underflow"]).inc();
                warn!("Cannot decrement swears below zero (count {}, by {})", count, by);
                return Err(SwearError::Underflow { count, delta: by });
            }
            ApplyOutcome::Overflow(count) => {
                metrics::MUTATIONS_TOTAL.with_label_values(&["overflow"]).inc();
                warn!("Cannot increment swears beyond the maximum (count {}, by {})", count, by);
                return Err(SwearError::Overflow { count, delta: by });
            }
        };

        let count = checked_count(stored)?;
        metrics::MUTATIONS_TOTAL.with_label_values(&["applied"]).inc();

        let report = self.pipeline.publish(ChangeEvent::new(stored)).await?;
        debug!(
            "Applied {:+} -> {} ({} subscriber(s) notified)",
            delta.get(),
            count,
            report.delivered
        );

        Ok(Tally::priced(count, price))
    }

    /// Zero the counter and broadcast `{0, 0}` to every subscriber
    pub async fn reset(&self) -> Result<Tally> {
        let _turn = self.sequencer.lock().await;

        self.with_store(|store| store.reset()).await?;
        metrics::MUTATIONS_TOTAL.with_label_values(&["reset"]).inc();
        warn!("Swears reset!");

        let report = self.pipeline.publish(ChangeEvent::reset()).await?;
        info!("Reset broadcast to {} subscriber(s)", report.delivered);

        Ok(Tally::zero())
    }

    /// Run a store call on the blocking pool
    async fn with_store<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CounterStore) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = tokio::task::spawn_blocking(move || call(store.as_ref()))
            .await
            .map_err(StoreError::from)??;
        Ok(value)
    }
}

fn checked_count(count: i64) -> Result<u64> {
    u64::try_from(count).map_err(|_| SwearError::Storage(StoreError::Corrupt(count)))
}
