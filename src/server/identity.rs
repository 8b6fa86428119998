//! Client identity extraction

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Identity used when the peer address is not available
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// The key admission limits are tracked under: the peer IP address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    /// Identity for a peer address
    pub fn from_addr(addr: &SocketAddr) -> Self {
        Self(addr.ip().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| Self::from_addr(addr))
            .unwrap_or_else(|| Self(UNKNOWN_IDENTITY.to_string()));
        Ok(identity)
    }
}
