//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy and health-check metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `healthcheck_requests_total` (counter): probes by outcome status, intercepted or forwarded
//! - `healthcheck_cache_events_total` (counter): cache stores and invalidations
//! - `healthcheck_local_failed` (gauge): 1 while the local gate is failed
//! - `proxy_requests_total` (counter): all requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `cluster_membership` (gauge): hosts per cluster and state
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests, CLI)
//! - Labels kept low-cardinality: no paths, no host addresses

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::context::MembershipStats;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!("proxy_requests_total", "method" => method.to_string(), "status" => status).increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_health_check(status: u16, intercepted: bool) {
    counter!(
        "healthcheck_requests_total",
        "status" => status.to_string(),
        "intercepted" => if intercepted { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_cache_event(event: &'static str) {
    counter!("healthcheck_cache_events_total", "event" => event).increment(1);
}

pub fn record_local_health(failed: bool) {
    gauge!("healthcheck_local_failed").set(if failed { 1.0 } else { 0.0 });
}

pub fn record_cluster_membership(cluster: &str, stats: MembershipStats) {
    let unhealthy = stats.total - stats.available();
    for (state, count) in [
        ("healthy", stats.healthy),
        ("degraded", stats.degraded),
        ("unhealthy", unhealthy),
    ] {
        gauge!("cluster_membership", "cluster" => cluster.to_string(), "state" => state)
            .set(count as f64);
    }
}
