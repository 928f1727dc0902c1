//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontdoor_requests_total` (counter): requests by surface, method, status
//! - `frontdoor_request_duration_seconds` (histogram): latency by surface
//! - `frontdoor_auth_decisions_total` (counter): terminal chain decisions by provider, outcome
//! - `frontdoor_rejections_total` (counter): rejections by kind
//! - `frontdoor_probe_hits_total` (counter): black-holed requests by probe
//!
//! # Design Decisions
//! - The `metrics` facade is a no-op until an exporter is installed, so
//!   recording is unconditional
//! - Labels never carry user input beyond the HTTP method

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(surface: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "frontdoor_requests_total",
        "surface" => surface,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("frontdoor_request_duration_seconds", "surface" => surface)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_decision(provider: &'static str, outcome: &'static str) {
    counter!(
        "frontdoor_auth_decisions_total",
        "provider" => provider,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rejection(kind: &'static str) {
    counter!("frontdoor_rejections_total", "kind" => kind).increment(1);
}

pub fn record_probe_hit(probe: &str) {
    counter!("frontdoor_probe_hits_total", "probe" => probe.to_string()).increment(1);
}

/// Count and time every request of one surface.
pub async fn track_requests(
    State(surface): State<&'static str>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    record_request(surface, &method, response.status().as_u16(), start);
    response
}
