use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use swearjar::config::Config;
use swearjar::cost::Tally;
use swearjar::server::Service;
use swearjar::store::{CounterStore, MemoryCounterStore, MAX_COUNT};

fn service(config: Config, start: u64) -> (Service, Arc<MemoryCounterStore>) {
    let store = Arc::new(MemoryCounterStore::with_count(start));
    let service = Service::new(&config, store.clone());
    (service, store)
}

async fn send(app: &Router, method: Method, uri: &str, peer: &str) -> (StatusCode, String) {
    let addr: SocketAddr = peer.parse().unwrap();
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .extension(ConnectInfo(addr))
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

const PEER: &str = "192.0.2.10:40000";

#[tokio::test]
async fn test_get_returns_priced_count() {
    let (service, _store) = service(Config::default(), 3);
    let app = service.router();

    let (status, body) = send(&app, Method::GET, "/api/swears?pricePerSwear=0.33", PEER).await;
    assert_eq!(status, StatusCode::OK);
    let tally: Tally = serde_json::from_str(&body).unwrap();
    assert_eq!(tally, Tally { count: 3, cost: 0.99 });
}

#[tokio::test]
async fn test_post_increments_and_decrements() {
    let (service, store) = service(Config::default(), 0);
    let app = service.router();

    let (status, body) = send(&app, Method::POST, "/api/swears?by=7&pricePerSwear=0.07", PEER).await;
    assert_eq!(status, StatusCode::OK);
    let tally: Tally = serde_json::from_str(&body).unwrap();
    assert_eq!(tally, Tally { count: 7, cost: 0.49 });

    let (status, _) = send(&app, Method::POST, "/api/swears?by=-2&pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.read().unwrap(), 5);
}

#[tokio::test]
async fn test_post_below_zero_is_rejected() {
    let (service, store) = service(Config::default(), 0);
    let app = service.router();

    let (status, body) = send(&app, Method::POST, "/api/swears?by=-1&pricePerSwear=0.25", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Cannot decrement swears below zero");
    assert_eq!(store.read().unwrap(), 0);
}

#[tokio::test]
async fn test_post_past_ceiling_is_rejected_as_overflow() {
    let (service, store) = service(Config::default(), (MAX_COUNT - 1) as u64);
    let app = service.router();

    let (status, body) = send(&app, Method::POST, "/api/swears?by=5&pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Cannot increment swears beyond the maximum count");
    assert_eq!(store.read().unwrap(), MAX_COUNT - 1);

    // The counter is still readable afterwards
    let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_price_too_large_to_cost_is_rejected() {
    let (service, _store) = service(Config::default(), 2);
    let app = service.router();

    let (status, body) = send(&app, Method::GET, "/api/swears?pricePerSwear=1e308", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "pricePerSwear is malformed in API request");
}

#[tokio::test]
async fn test_invalid_inputs() {
    let (service, store) = service(Config::default(), 1);
    let app = service.router();

    let (status, body) = send(&app, Method::GET, "/api/swears", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "pricePerSwear is malformed in API request");

    let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=-1", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/swears?by=1.5&pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "by must be an integer");

    let (status, _) = send(&app, Method::POST, "/api/swears?pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(store.read().unwrap(), 1);
}

#[tokio::test]
async fn test_delete_resets() {
    let (service, store) = service(Config::default(), 9);
    let app = service.router();

    let (status, body) = send(&app, Method::DELETE, "/api/swears", PEER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(store.read().unwrap(), 0);
}

#[tokio::test]
async fn test_request_limit_per_identity() {
    let mut config = Config::default();
    config.rate_limit.request_limit = 2;
    let (service, _store) = service(config, 0);
    let app = service.router();

    for _ in 0..2 {
        let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=1", PEER).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, Method::POST, "/api/swears?by=1&pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, "Rate limit exceeded");

    // Other identities keep their own window
    let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=1", "192.0.2.11:40000").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_denied_request_does_not_mutate() {
    let mut config = Config::default();
    config.rate_limit.request_limit = 1;
    let (service, store) = service(config, 0);
    let app = service.router();

    send(&app, Method::GET, "/api/swears?pricePerSwear=1", PEER).await;
    let (status, _) = send(&app, Method::POST, "/api/swears?by=5&pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(store.read().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_peer_address_uses_unknown_identity() {
    let (service, _store) = service(Config::default(), 0);
    let app = service.router();

    let request = Request::builder()
        .uri("/api/swears?pricePerSwear=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(service.state.limiter.tracked_identities() >= 1);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let mut config = Config::default();
    config.server.api_key = Some("s3cret".to_string());
    let (service, _store) = service(config, 0);
    let app = service.router();

    let (status, body) = send(&app, Method::GET, "/api/swears?pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=1&apiKey=wrong", PEER).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/swears?pricePerSwear=1&apiKey=s3cret", PEER).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder()
        .uri("/api/swears?pricePerSwear=1")
        .header("API-KEY", "s3cret")
        .extension(ConnectInfo(PEER.parse::<SocketAddr>().unwrap()))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_routes_are_not_found() {
    let (service, _store) = service(Config::default(), 0);
    let app = service.router();

    let (status, _) = send(&app, Method::GET, "/api/other", PEER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::PUT, "/api/swears?pricePerSwear=1", PEER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, "/health", PEER).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_websocket_route_validates_price_before_upgrade() {
    let (service, _store) = service(Config::default(), 0);
    let app = service.router();

    let (status, _) = send(&app, Method::GET, "/ws/swears?pricePerSwear=abc", PEER).await;
    assert!(status.is_client_error());
    assert!(service.state.registry.is_empty());
}
