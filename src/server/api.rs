//! `/api/swears` handlers

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};

use super::identity::ClientIdentity;
use super::AppState;
use crate::cost::{Delta, PriceMultiplier, Tally};
use crate::error::{Result, SwearError};
use crate::metrics;

/// Query parameters of `/api/swears`
#[derive(Debug, Default, Deserialize)]
pub struct SwearQuery {
    #[serde(rename = "pricePerSwear")]
    pub price_per_swear: Option<String>,
    pub by: Option<String>,
}

/// `GET /api/swears?pricePerSwear=P`
pub async fn read_swears(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Query(query): Query<SwearQuery>,
) -> Response {
    let result = read(&state, &identity, &query).await;
    respond("GET", result.map(Json))
}

async fn read(state: &AppState, identity: &ClientIdentity, query: &SwearQuery) -> Result<Tally> {
    admit(state, identity)?;
    let price = PriceMultiplier::parse(query.price_per_swear.as_deref())?;
    state.gateway.read(price).await
}

/// `POST /api/swears?by=N&pricePerSwear=P`
pub async fn mutate_swears(
    State(state): State<AppState>,
    identity: ClientIdentity,
    Query(query): Query<SwearQuery>,
) -> Response {
    let result = mutate(&state, &identity, &query).await;
    respond("POST", result.map(Json))
}

async fn mutate(state: &AppState, identity: &ClientIdentity, query: &SwearQuery) -> Result<Tally> {
    admit(state, identity)?;
    let price = PriceMultiplier::parse(query.price_per_swear.as_deref())?;
    let delta = Delta::parse(query.by.as_deref())?;
    let tally = state.gateway.mutate(delta, price).await?;
    info!("{} swears by {} -> {}", identity.as_str(), delta.get(), tally.count);
    Ok(tally)
}

/// `DELETE /api/swears`
pub async fn reset_swears(State(state): State<AppState>, identity: ClientIdentity) -> Response {
    let result = match admit(&state, &identity) {
        Ok(()) => state.gateway.reset().await.map(|_| "OK"),
        Err(e) => Err(e),
    };
    respond("DELETE", result)
}

/// Unknown methods and paths
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn admit(state: &AppState, identity: &ClientIdentity) -> Result<()> {
    if state.limiter.admit_request(identity.as_str()) {
        return Ok(());
    }
    metrics::RATE_LIMITED_TOTAL.with_label_values(&["request"]).inc();
    warn!("Rate limit exceeded for {}", identity.as_str());
    Err(SwearError::RateLimited)
}

fn respond<T: IntoResponse>(method: &str, result: Result<T>) -> Response {
    let response = match result {
        Ok(body) => body.into_response(),
        Err(SwearError::Storage(e)) => {
            tracing::error!("Swears data malformed on backend: {}", e);
            SwearError::Storage(e).into_response()
        }
        Err(e) => e.into_response(),
    };
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method, response.status().as_str()])
        .inc();
    response
}
