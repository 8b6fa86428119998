//! Connection Registry
//!
//! Tracks live subscriptions and returns each identity's connection slot to
//! the [`RateLimiter`] exactly once when a subscription closes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cost::{PriceMultiplier, Tally};
use crate::metrics;
use crate::rate_limit::RateLimiter;

/// Unique subscription identifier
pub type SubscriptionId = Uuid;

/// Channel a subscription's payloads are delivered on
pub type DeliveryHandle = mpsc::UnboundedSender<Tally>;

/// Receiving half of a [`DeliveryHandle`]
pub type DeliveryStream = mpsc::UnboundedReceiver<Tally>;

/// Create a connected delivery handle and stream
pub fn delivery_channel() -> (DeliveryHandle, DeliveryStream) {
    mpsc::unbounded_channel()
}

/// Lifecycle of a subscription
///
/// `Pending` covers a connection that has not been admitted yet. `Closed` is
/// terminal; a reconnect always creates a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Pending,
    Open,
    Closed,
}

/// Admission was refused because the identity has no free connection slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Too many connections for {identity}")]
pub struct Rejected {
    /// Identity that was refused
    pub identity: String,
}

/// One live observer
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Subscription id
    pub id: SubscriptionId,
    /// Client identity holding the slot
    pub identity: String,
    /// Price used for this subscriber's costs; fixed for its lifetime
    pub price: PriceMultiplier,
    /// Where payloads are sent
    pub handle: DeliveryHandle,
}

/// Registry of open subscriptions
#[derive(Debug)]
pub struct ConnectionRegistry {
    limiter: Arc<RateLimiter>,
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
}

impl ConnectionRegistry {
    /// Create an empty registry releasing slots on `limiter`
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a subscription for `identity` if it has a free slot
    pub fn admit(
        &self,
        identity: &str,
        price: PriceMultiplier,
        handle: DeliveryHandle,
    ) -> Result<SubscriptionId, Rejected> {
        if !self.limiter.admit_connection(identity) {
            return Err(Rejected {
                identity: identity.to_string(),
            });
        }

        let id = Uuid::new_v4();
        let subscription = Subscription {
            id,
            identity: identity.to_string(),
            price,
            handle,
        };

        {
            let mut subscriptions = self.subscriptions();
            subscriptions.insert(id, subscription);
            metrics::ACTIVE_SUBSCRIPTIONS.set(subscriptions.len() as i64);
        }

        info!(
            "Subscription {} opened for {} at {} per swear",
            id,
            identity,
            price.get()
        );
        Ok(id)
    }

    /// Close a subscription, releasing its slot
    ///
    /// Returns false if `id` was already closed; a second call never
    /// releases a second slot.
    pub fn remove(&self, id: &SubscriptionId) -> bool {
        let removed = {
            let mut subscriptions = self.subscriptions();
            let removed = subscriptions.remove(id);
            metrics::ACTIVE_SUBSCRIPTIONS.set(subscriptions.len() as i64);
            removed
        };

        match removed {
            Some(subscription) => {
                self.limiter.release_connection(&subscription.identity);
                info!("Subscription {} closed for {}", id, subscription.identity);
                true
            }
            None => {
                debug!("Subscription {} already closed", id);
                false
            }
        }
    }

    /// Current state of a subscription
    pub fn state(&self, id: &SubscriptionId) -> SubscriptionState {
        if self.subscriptions().contains_key(id) {
            SubscriptionState::Open
        } else {
            SubscriptionState::Closed
        }
    }

    /// Copy of every open subscription
    pub fn snapshot(&self) -> Vec<Subscription> {
        self.subscriptions().values().cloned().collect()
    }

    /// Number of open subscriptions
    pub fn len(&self) -> usize {
        self.subscriptions().len()
    }

    /// Whether no subscriptions are open
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every subscription
    pub fn clear(&self) {
        let ids: Vec<SubscriptionId> = self.subscriptions().keys().copied().collect();
        for id in ids {
            self.remove(&id);
        }
    }

    /// The limiter this registry releases slots on
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns an admitted subscription and closes it when dropped
///
/// Dropping the guard covers every exit path of a connection: a failed
/// upgrade, a client close, an idle timeout, or a handler error.
#[derive(Debug)]
pub struct SubscriptionGuard {
    registry: Arc<ConnectionRegistry>,
    id: SubscriptionId,
}

impl SubscriptionGuard {
    /// Admit a subscription and wrap it in a guard
    pub fn admit(
        registry: Arc<ConnectionRegistry>,
        identity: &str,
        price: PriceMultiplier,
        handle: DeliveryHandle,
    ) -> Result<Self, Rejected> {
        let id = registry.admit(identity, price, handle)?;
        Ok(Self { registry, id })
    }

    /// The guarded subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current state of the guarded subscription
    pub fn state(&self) -> SubscriptionState {
        self.registry.state(&self.id)
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
