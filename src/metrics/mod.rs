//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Registry broadcasts, deletions and rejections
//! - Resolver poll ticks, bid decisions and decay fallbacks
//! - Registry fetch errors by network classification

use crate::error::{CoordinatorError, CoordinatorResult, NetworkErrorKind};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Registry metrics
    pub static ref AUCTIONS_BROADCAST: Counter = register_counter!(
        "auction_registry_broadcasts_total",
        "Total auctions accepted by the registry"
    ).unwrap();

    pub static ref AUCTIONS_REJECTED: Counter = register_counter!(
        "auction_registry_rejections_total",
        "Total broadcasts rejected by validation"
    ).unwrap();

    pub static ref AUCTIONS_DELETED: Counter = register_counter!(
        "auction_registry_deletions_total",
        "Total auctions deleted"
    ).unwrap();

    pub static ref AUCTIONS_STORED: Gauge = register_gauge!(
        "auction_registry_stored",
        "Auctions currently held in memory, stale ones included"
    ).unwrap();

    // Resolver metrics
    pub static ref RESOLVER_TICKS: CounterVec = register_counter_vec!(
        "auction_resolver_ticks_total",
        "Poll ticks by outcome",
        &["result"]
    ).unwrap();

    pub static ref RESOLVER_DECISIONS: CounterVec = register_counter_vec!(
        "auction_resolver_decisions_total",
        "Bid decisions by action",
        &["action"]
    ).unwrap();

    pub static ref RESOLVER_DECAY_FALLBACKS: Counter = register_counter!(
        "auction_resolver_decay_fallbacks_total",
        "Auctions priced at their start price because decay evaluation failed"
    ).unwrap();

    pub static ref RESOLVER_FETCH_ERRORS: CounterVec = register_counter_vec!(
        "auction_resolver_fetch_errors_total",
        "Registry request failures by classification",
        &["kind"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> CoordinatorResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_auction_broadcast(stored: usize) {
    AUCTIONS_BROADCAST.inc();
    set_auctions_stored(stored);
}

pub fn record_auction_rejected() {
    AUCTIONS_REJECTED.inc();
}

pub fn record_auction_deleted(stored: usize) {
    AUCTIONS_DELETED.inc();
    set_auctions_stored(stored);
}

pub fn set_auctions_stored(stored: usize) {
    AUCTIONS_STORED.set(stored as f64);
}

pub fn record_tick(success: bool) {
    let result = if success { "ok" } else { "error" };
    RESOLVER_TICKS.with_label_values(&[result]).inc();
}

pub fn record_decision(action: &str) {
    RESOLVER_DECISIONS.with_label_values(&[action]).inc();
}

pub fn record_decay_fallback() {
    RESOLVER_DECAY_FALLBACKS.inc();
}

pub fn record_fetch_error(error: &CoordinatorError) {
    let kind = error
        .network_kind()
        .map(NetworkErrorKind::as_str)
        .unwrap_or("response");
    RESOLVER_FETCH_ERRORS.with_label_values(&[kind]).inc();
}
