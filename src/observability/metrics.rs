//! Metrics collection and exposition.
//!
//! # Metrics
//! - `remote_guard_status` (gauge): current status kind per repository
//! - `remote_guard_status_changes_total` (counter): forwarded transitions
//! - `remote_guard_blocked_requests_total` (counter): requests refused
//!   locally, by `mode` (manual, auto, offline)
//! - `remote_guard_remote_failures_total` (counter): failures recorded
//!   against a remote
//! - `remote_guard_probes_total` (counter): recovery probes by `outcome`
//!
//! Recording without an installed recorder is a no-op, so library users
//! and tests pay nothing.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::status::StatusKind;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_status_change(repository: &str, kind: StatusKind) {
    gauge!("remote_guard_status", "repository" => repository.to_string()).set(kind as u8 as f64);
    counter!(
        "remote_guard_status_changes_total",
        "repository" => repository.to_string(),
        "status" => kind.to_string()
    )
    .increment(1);
}

pub fn record_blocked_request(repository: &str, mode: &'static str) {
    counter!(
        "remote_guard_blocked_requests_total",
        "repository" => repository.to_string(),
        "mode" => mode
    )
    .increment(1);
}

pub fn record_remote_failure(repository: &str) {
    counter!("remote_guard_remote_failures_total", "repository" => repository.to_string()).increment(1);
}

pub fn record_probe(repository: &str, outcome: &'static str) {
    counter!(
        "remote_guard_probes_total",
        "repository" => repository.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
