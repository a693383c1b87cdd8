//! Metrics collection and exposition.
//!
//! # Metrics
//! - `prefork_requests_timed_out_total` (counter): requests answered with `SERVER_TIMEOUT`
//! - `prefork_requests_invalid_body_total` (counter): bodies rejected with `INVALID_REQUEST`
//! - `prefork_requests_not_found_total` (counter): requests answered by the catch-all
//! - `prefork_handler_panics_total` (counter): handler faults caught and contained
//! - `prefork_health_probes_total` (counter): self-probes by `outcome`
//! - `prefork_open_connections` (gauge): connections currently served
//!
//! # Design Decisions
//! - Updates are no-ops until a recorder is installed
//! - Each worker exports on its own port (base port + worker index)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Exporter address for a worker: the base port shifted by the worker index.
pub fn worker_metrics_addr(base: SocketAddr, worker_index: Option<usize>) -> SocketAddr {
    let offset = worker_index
        .and_then(|i| u16::try_from(i).ok())
        .unwrap_or(0);
    SocketAddr::new(base.ip(), base.port().saturating_add(offset))
}

pub fn record_timeout() {
    metrics::counter!("prefork_requests_timed_out_total").increment(1);
}

pub fn record_invalid_body() {
    metrics::counter!("prefork_requests_invalid_body_total").increment(1);
}

pub fn record_not_found() {
    metrics::counter!("prefork_requests_not_found_total").increment(1);
}

pub fn record_handler_panic() {
    metrics::counter!("prefork_handler_panics_total").increment(1);
}

pub fn record_probe(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("prefork_health_probes_total", "outcome" => outcome).increment(1);
}

pub fn set_open_connections(count: u64) {
    metrics::gauge!("prefork_open_connections").set(count as f64);
}
