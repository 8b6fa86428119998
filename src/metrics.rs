// Prometheus metrics for SwearJar service monitoring
//
// Exposes metrics on /metrics HTTP endpoint:
// - API requests by method and status (counter)
// - Admission rejections (counter)
// - Counter mutations by outcome, including underflow and overflow (counter)
// - Broadcast fan-out and dead links (counter)
// - Active subscriptions and current count (gauge)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    // API metrics
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("api_requests_total", "Total number of API requests"),
        &["method", "status"]
    ).expect("Failed to create API requests metric");

    pub static ref RATE_LIMITED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("rate_limited_total", "Total number of admissions denied"),
        &["kind"]
    ).expect("Failed to create rate limited metric");

    // Counter metrics
    pub static ref MUTATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("counter_mutations_total", "Total number of counter mutations"),
        &["outcome"]
    ).expect("Failed to create mutations metric");

    pub static ref SWEAR_COUNT: IntGauge = IntGauge::new(
        "swear_count",
        "Most recently observed counter value"
    ).expect("Failed to create swear count metric");

    // Fan-out metrics
    pub static ref BROADCASTS_TOTAL: IntCounter = IntCounter::new(
        "broadcasts_total",
        "Total number of change events dispatched"
    ).expect("Failed to create broadcasts metric");

    pub static ref DELIVERIES_TOTAL: IntCounter = IntCounter::new(
        "broadcast_deliveries_total",
        "Total number of payloads handed to subscribers"
    ).expect("Failed to create deliveries metric");

    pub static ref DEAD_LINKS_TOTAL: IntCounter = IntCounter::new(
        "broadcast_dead_links_total",
        "Total number of registered subscriptions found with a closed handle"
    ).expect("Failed to create dead links metric");

    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = IntGauge::new(
        "active_subscriptions",
        "Number of currently open subscriptions"
    ).expect("Failed to create active subscriptions metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(API_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMITED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MUTATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SWEAR_COUNT.clone()))?;
    REGISTRY.register(Box::new(BROADCASTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DELIVERIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEAD_LINKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_SUBSCRIPTIONS.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
