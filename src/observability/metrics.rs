//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by route, status, plugin
//! - `proxy_request_duration_seconds` (histogram): time to upstream response headers
//! - `proxy_plugin_dispatch_total` (counter): dispatch outcome per plugin ("none" on passthrough)
//! - `proxy_registered_plugins` (gauge): current registry size
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, plugin: &str, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string(),
        "plugin" => plugin.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_plugin_dispatch(plugin: &str) {
    metrics::counter!("proxy_plugin_dispatch_total", "plugin" => plugin.to_string()).increment(1);
}

pub fn record_registered_plugins(count: usize) {
    metrics::gauge!("proxy_registered_plugins").set(count as f64);
}
