//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_endpoint_requests_total` (counter): by method, endpoint, status
//! - `gateway_endpoint_duration_seconds` (histogram): endpoint latency
//! - `gateway_backend_requests_total` (counter): by backend, status
//! - `gateway_backend_duration_seconds` (histogram): backend call latency
//!
//! Recording is a no-op until a recorder is installed, so tests need no setup.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one endpoint invocation.
pub fn record_endpoint(method: &str, endpoint: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gateway_endpoint_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "gateway_endpoint_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one backend call.
pub fn record_backend_call(backend: &str, status: &str, start: Instant) {
    ::metrics::counter!(
        "gateway_backend_requests_total",
        "backend" => backend.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_backend_duration_seconds", "backend" => backend.to_string())
        .record(start.elapsed().as_secs_f64());
}
