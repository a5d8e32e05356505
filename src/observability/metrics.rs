//! Metrics collection and exposition.
//!
//! # Metrics
//! - `api_requests_total` (counter): requests by method and status
//! - `api_request_duration_seconds` (histogram): latency distribution
//! - `api_rate_limited_total` (counter): requests rejected by the rate limiter
//! - `api_cors_rejected_total` (counter): requests from disallowed origins
//! - `api_sessions_swept_total` (counter): expired sessions removed
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests pay nothing
//! - The Prometheus exporter is opt-in and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started: Instant) {
    let status = status.to_string();
    ::metrics::counter!(
        "api_requests_total",
        "method" => method.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    ::metrics::histogram!(
        "api_request_duration_seconds",
        "method" => method.to_string(),
        "status" => status
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    ::metrics::counter!("api_rate_limited_total").increment(1);
}

pub fn record_cors_rejected() {
    ::metrics::counter!("api_cors_rejected_total").increment(1);
}

pub fn record_sessions_swept(count: usize) {
    ::metrics::counter!("api_sessions_swept_total").increment(count as u64);
}

/// Outermost stage: counts every response, including rejections.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), started);
    response
}
