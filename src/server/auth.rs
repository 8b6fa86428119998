//! API key check
//!
//! When a key is configured every request must carry it, either as the
//! `apiKey` query parameter or the `API-KEY` header.

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

use super::AppState;
use crate::metrics;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "api-key";

#[derive(Debug, Deserialize)]
struct KeyQuery {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
}

/// Key presented by a request, query parameter first
fn presented_key(request: &Request) -> Option<String> {
    let from_query = Query::<KeyQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.api_key);

    from_query.or_else(|| {
        request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    })
}

/// Reject requests without the configured key
pub async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };

    if presented_key(&request).as_deref() == Some(expected) {
        return next.run(request).await;
    }

    warn!("Unauthorized {} {}", request.method(), request.uri().path());
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[request.method().as_str(), "401"])
        .inc();
    (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
