//! Metrics collection and exposition.
//!
//! # Metrics
//! - `multiqueue_operations_total` (counter): operations by kind and outcome
//! - `multiqueue_backend_failures_total` (counter): penalties applied, by backend
//! - `multiqueue_backend_error_score` (gauge): score right after a penalty
//! - `multiqueue_fallback_selections_total` (counter): picks made with no healthy backend
//! - `multiqueue_recovery_probes_total` (counter): probes by backend and result

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one queue operation.
pub fn record_operation(operation: &'static str, outcome: &'static str) {
    metrics::counter!(
        "multiqueue_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a penalty applied to `backend` and its resulting score.
pub fn record_error_score(backend: &str, score: f64) {
    metrics::counter!("multiqueue_backend_failures_total", "backend" => backend.to_string())
        .increment(1);
    metrics::gauge!("multiqueue_backend_error_score", "backend" => backend.to_string()).set(score);
}

pub fn record_fallback_selection() {
    metrics::counter!("multiqueue_fallback_selections_total").increment(1);
}

pub fn record_probe(backend: &str, passed: bool) {
    let result = if passed { "passed" } else { "failed" };
    metrics::counter!(
        "multiqueue_recovery_probes_total",
        "backend" => backend.to_string(),
        "result" => result
    )
    .increment(1);
}
