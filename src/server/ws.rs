//! `/ws/swears` live subscriptions
//!
//! A subscription is admitted before the upgrade completes, so a rejected
//! client gets a plain `429` and never a socket. The connection is
//! receive-only: any text or binary frame from the client closes it.

use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::identity::ClientIdentity;
use super::AppState;
use crate::config::ConnectionConfig;
use crate::cost::PriceMultiplier;
use crate::error::SwearError;
use crate::metrics;
use crate::registry::{delivery_channel, DeliveryStream, SubscriptionGuard};

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    #[serde(rename = "pricePerSwear")]
    pub price_per_swear: Option<String>,
}

/// Why a subscription ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    ClientClosed,
    ProtocolViolation,
    IdleTimeout,
    Removed,
    SocketError,
}

/// `GET /ws/swears?pricePerSwear=P`
pub async fn subscribe(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Query(query): Query<SubscribeQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let price = match PriceMultiplier::parse(query.price_per_swear.as_deref()) {
        Ok(price) => price,
        Err(e) => return e.into_response(),
    };

    let (handle, stream) = delivery_channel();
    let guard = match SubscriptionGuard::admit(
        Arc::clone(&state.registry),
        identity.as_str(),
        price,
        handle,
    ) {
        Ok(guard) => guard,
        Err(rejected) => {
            metrics::RATE_LIMITED_TOTAL.with_label_values(&["connection"]).inc();
            warn!("{}", rejected);
            return SwearError::TooManyConnections.into_response();
        }
    };

    let connection = state.connection.clone();
    upgrade
        .on_failed_upgrade(|e| debug!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| run_subscription(socket, guard, stream, connection))
}

async fn run_subscription(
    socket: WebSocket,
    guard: SubscriptionGuard,
    mut stream: DeliveryStream,
    connection: ConnectionConfig,
) {
    let id = guard.id();
    let (mut sender, mut receiver) = socket.split();

    let period = connection.ping_interval();
    let mut ping = interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Instant::now();

    let ending = loop {
        tokio::select! {
            delivery = stream.recv() => {
                let Some(tally) = delivery else {
                    break Ending::Removed;
                };
                let payload = match serde_json::to_string(&tally) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to encode payload for {}: {}", id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break Ending::SocketError;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    last_seen = Instant::now();
                }
                Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                    let close = CloseFrame {
                        code: close_code::POLICY,
                        reason: "Receive-only connection".into(),
                    };
                    let _ = sender.send(Message::Close(Some(close))).await;
                    break Ending::ProtocolViolation;
                }
                Some(Ok(Message::Close(_))) | None => break Ending::ClientClosed,
                Some(Err(e)) => {
                    debug!("Subscription {} read error: {}", id, e);
                    break Ending::SocketError;
                }
            },
            _ = ping.tick() => {
                if last_seen.elapsed() >= connection.idle_timeout() {
                    let _ = sender.send(Message::Close(None)).await;
                    break Ending::IdleTimeout;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break Ending::SocketError;
                }
            }
        }
    };

    match ending {
        Ending::ProtocolViolation => warn!("Subscription {} sent data on a receive-only socket", id),
        Ending::IdleTimeout => debug!("Subscription {} idle for {:?}", id, connection.idle_timeout()),
        other => debug!("Subscription {} ended: {:?}", id, other),
    }

    // Releases the slot; pending deliveries in `stream` are discarded with it
    drop(guard);
}
