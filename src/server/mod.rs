//! HTTP and WebSocket surface
//!
//! ```text
//! ┌────────────┐   admit_request    ┌──────────────┐
//! │ /api/swears│ ─────────────────▶ │ RateLimiter  │
//! └─────┬──────┘                    └──────▲───────┘
//!       │ read / mutate / reset            │ admit / release slot
//! ┌─────▼────────────┐  ChangeEvent  ┌─────┴──────────────┐
//! │ MutationGateway  │ ────────────▶ │ BroadcastPipeline  │──▶ subscribers
//! └──────────────────┘               └────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod identity;
pub mod ws;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::broadcast::BroadcastPipeline;
use crate::config::{Config, ConnectionConfig, StoreConfig};
use crate::error::FatalError;
use crate::gateway::MutationGateway;
use crate::metrics_server;
use crate::rate_limit::RateLimiter;
use crate::registry::ConnectionRegistry;
use crate::store::{CounterStore, MemoryCounterStore, SqliteCounterStore};

pub use identity::ClientIdentity;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub gateway: Arc<MutationGateway>,
    pub registry: Arc<ConnectionRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub api_key: Option<Arc<str>>,
    pub connection: ConnectionConfig,
}

/// A wired service: state plus the running broadcast worker
#[derive(Debug)]
pub struct Service {
    pub state: AppState,
    pub worker: JoinHandle<Result<(), FatalError>>,
}

impl Service {
    /// Wire the limiter, registry, pipeline and gateway over `store`
    ///
    /// Spawns the broadcast worker, so it must run inside a Tokio runtime.
    pub fn new(config: &Config, store: Arc<dyn CounterStore>) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let registry = Arc::new(ConnectionRegistry::new(Arc::clone(&limiter)));
        let (pipeline, worker) = BroadcastPipeline::new(Arc::clone(&registry)).spawn();
        let gateway = Arc::new(MutationGateway::new(store, pipeline));

        let state = AppState {
            gateway,
            registry,
            limiter,
            api_key: config.server.api_key.as_deref().map(Arc::from),
            connection: config.connection.clone(),
        };
        Self { state, worker }
    }

    /// Router over this service's state
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let swears = get(api::read_swears)
        .post(api::mutate_swears)
        .delete(api::reset_swears)
        .fallback(api::not_found);

    Router::new()
        .route("/api/swears", swears)
        .route("/ws/swears", get(ws::subscribe))
        .route("/health", get(health))
        .fallback(api::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Open the configured counter store
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn CounterStore>> {
    if config.in_memory {
        warn!("Using in-memory counter store; the count is lost on exit");
        return Ok(Arc::new(MemoryCounterStore::new()));
    }
    let store = SqliteCounterStore::open(&config.path)
        .with_context(|| format!("Failed to open counter store at {}", config.path))?;
    Ok(Arc::new(store))
}

/// Periodically drop idle rate-limit state
fn spawn_sweeper(limiter: Arc<RateLimiter>) -> JoinHandle<()> {
    let period = limiter.config().sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let dropped = limiter.sweep();
            if dropped > 0 {
                debug!("Swept {} idle rate-limit window(s)", dropped);
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Run the service until shutdown
///
/// # Errors
///
/// Returns an error if startup fails, the listener fails, or the broadcast
/// pipeline stops on an internal invariant violation.
pub async fn serve(config: Config) -> Result<()> {
    let store = open_store(&config.store)?;
    let Service { state, mut worker } = Service::new(&config, store);

    if state.api_key.is_none() {
        warn!("No API key configured; requests are not authenticated");
    }

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("SwearJar listening on {}", listener.local_addr()?);

    if config.metrics.enabled {
        let port = config.metrics.port;
        tokio::spawn(async move {
            if let Err(e) = metrics_server::start_metrics_server(port).await {
                error!("Metrics server stopped: {:#}", e);
            }
        });
    }

    let sweeper = spawn_sweeper(Arc::clone(&state.limiter));
    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();

    let result = tokio::select! {
        served = server => served.context("HTTP server error"),
        finished = &mut worker => match finished {
            Ok(Ok(())) => Err(anyhow!("Broadcast pipeline stopped unexpectedly")),
            Ok(Err(fatal)) => Err(fatal.into()),
            Err(e) => Err(anyhow!("Broadcast pipeline panicked: {}", e)),
        },
    };

    sweeper.abort();
    result
}
