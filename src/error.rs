//! Service Error Types
//!
//! Caller-facing errors map to distinct, stable HTTP responses. Internal
//! invariant violations are a separate type and stop the process.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::store::StoreError;

/// Errors surfaced to API and WebSocket callers
#[derive(Debug, thiserror::Error)]
pub enum SwearError {
    /// Price multiplier missing, non-finite, or not positive
    #[error("pricePerSwear is malformed in API request")]
    InvalidPrice,

    /// Delta missing, non-finite, or not an integer
    #[error("by must be an integer")]
    InvalidDelta,

    /// Request window exhausted for this identity
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Connection slots exhausted for this identity
    #[error("Too many connections")]
    TooManyConnections,

    /// Mutation would drive the counter below zero
    #[error("Cannot decrement swears below zero")]
    Underflow {
        /// Count at the time the mutation was refused
        count: i64,
        /// Rejected delta
        delta: i64,
    },

    /// Mutation would push the counter past its ceiling
    #[error("Cannot increment swears beyond the maximum count")]
    Overflow {
        /// Count at the time the mutation was refused
        count: i64,
        /// Rejected delta
        delta: i64,
    },

    /// Counter store unreachable or corrupt
    #[error("Swears data unavailable: {0}")]
    Storage(#[from] StoreError),

    /// Broadcast worker is no longer running
    #[error("Broadcast pipeline unavailable")]
    PipelineUnavailable,
}

impl SwearError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            SwearError::InvalidPrice
            | SwearError::InvalidDelta
            | SwearError::Underflow { .. }
            | SwearError::Overflow { .. } => StatusCode::BAD_REQUEST,
            SwearError::RateLimited | SwearError::TooManyConnections => {
                StatusCode::TOO_MANY_REQUESTS
            }
            SwearError::Storage(_) | SwearError::PipelineUnavailable => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SwearError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Storage details stay in the logs
            SwearError::Storage(_) => "Swears data malformed on backend".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

/// Internal invariant violations
///
/// These are never retried. The server stops and the process exits
/// non-zero rather than continue serving incoherent state.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    /// A change event reached the pipeline with an impossible count
    #[error("FATAL: broadcast pipeline received malformed event (count {0})")]
    MalformedEvent(i64),
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, SwearError>;
