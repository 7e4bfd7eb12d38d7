//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lightmoon_requests_total` (counter): requests by method, outcome, status
//! - `lightmoon_request_duration_seconds` (histogram): dispatch latency by outcome
//! - `lightmoon_routes` (gauge): compiled (method, pattern) routes

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "lightmoon_requests_total";
pub const REQUEST_DURATION: &str = "lightmoon_request_duration_seconds";
pub const ROUTES: &str = "lightmoon_routes";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched request.
pub fn record_request(method: &Method, outcome: &'static str, status: u16, started: Instant) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION, "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_routes(count: usize) {
    ::metrics::gauge!(ROUTES).set(count as f64);
}
