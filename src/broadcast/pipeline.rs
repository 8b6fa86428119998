//! Broadcast Pipeline
//!
//! A single worker task consumes change events in the order the gateway
//! produced them and fans each one out to every open subscription, pricing
//! it with that subscription's own multiplier.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::event::{ChangeEvent, DispatchReport};
use crate::cost::Tally;
use crate::error::{FatalError, SwearError};
use crate::metrics;
use crate::registry::ConnectionRegistry;

#[derive(Debug)]
struct Envelope {
    event: ChangeEvent,
    receipt: oneshot::Sender<DispatchReport>,
}

/// Producer side of the pipeline, held by the gateway
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl PipelineHandle {
    /// Queue `event` and wait until it has been issued to every subscriber
    pub async fn publish(&self, event: ChangeEvent) -> Result<DispatchReport, SwearError> {
        let (receipt, done) = oneshot::channel();
        self.tx
            .send(Envelope { event, receipt })
            .map_err(|_| SwearError::PipelineUnavailable)?;
        done.await.map_err(|_| SwearError::PipelineUnavailable)
    }

    /// Whether the worker has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fan-out worker
#[derive(Debug, Clone)]
pub struct BroadcastPipeline {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastPipeline {
    /// Create a pipeline delivering to `registry`'s subscriptions
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Start the worker on the current runtime
    ///
    /// The join handle resolves with `Err` only on an internal invariant
    /// violation; the caller is expected to stop the process.
    pub fn spawn(self) -> (PipelineHandle, JoinHandle<Result<(), FatalError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(self.run(rx));
        (PipelineHandle { tx }, worker)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Envelope>) -> Result<(), FatalError> {
        info!("Broadcast pipeline started");

        while let Some(Envelope { event, receipt }) = rx.recv().await {
            let report = match self.dispatch(&event) {
                Ok(report) => report,
                Err(fatal) => {
                    error!("{}", fatal);
                    return Err(fatal);
                }
            };
            // The mutating caller may have gone away; the fan-out already happened
            let _ = receipt.send(report);
        }

        info!("Broadcast pipeline stopped");
        Ok(())
    }

    /// Deliver `event` to every open subscription
    ///
    /// Sends never block, so a slow or dead subscriber cannot hold up the
    /// others.
    pub fn dispatch(&self, event: &ChangeEvent) -> Result<DispatchReport, FatalError> {
        let count = u64::try_from(event.count).map_err(|_| FatalError::MalformedEvent(event.count))?;

        let mut report = DispatchReport::default();
        let mut dead = Vec::new();

        for subscription in self.registry.snapshot() {
            let tally = Tally::priced(count, subscription.price);
            if subscription.handle.send(tally).is_ok() {
                report.delivered += 1;
            } else {
                dead.push(subscription.id);
            }
        }

        for id in dead {
            if self.registry.remove(&id) {
                warn!(
                    "Subscription {} was registered but its handle is closed; removed",
                    id
                );
                metrics::DEAD_LINKS_TOTAL.inc();
                report.pruned += 1;
            } else {
                debug!("Dropped delivery racing close of subscription {}", id);
            }
        }

        metrics::BROADCASTS_TOTAL.inc();
        metrics::DELIVERIES_TOTAL.inc_by(report.delivered as u64);
        metrics::SWEAR_COUNT.set(event.count);
        debug!(
            "Broadcast count {} to {} subscriber(s)",
            count, report.delivered
        );

        Ok(report)
    }
}
