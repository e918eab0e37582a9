//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sdn_packet_in_total` (counter): packet-in events by outcome
//! - `sdn_flow_installs_total` (counter): rules installed by kind
//! - `sdn_flow_install_failures_total` (counter): rejected installs
//! - `sdn_backend_selections_total` (counter): selections by backend
//! - `sdn_stale_events_total` (counter): events for disconnected switches
//! - `sdn_switches_active` (gauge): currently active sessions
//!
//! # Design Decisions
//! - Labels are low-cardinality (outcome, rule kind, backend address)
//! - Exporter is optional; the macros are no-ops without a recorder

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_packet_in(outcome: &'static str) {
    metrics::counter!("sdn_packet_in_total", "outcome" => outcome).increment(1);
}

pub fn record_flow_install(kind: &'static str) {
    metrics::counter!("sdn_flow_installs_total", "kind" => kind).increment(1);
}

pub fn record_install_failure() {
    metrics::counter!("sdn_flow_install_failures_total").increment(1);
}

pub fn record_backend_selection(backend: String) {
    metrics::counter!("sdn_backend_selections_total", "backend" => backend).increment(1);
}

pub fn record_stale_event() {
    metrics::counter!("sdn_stale_events_total").increment(1);
}

pub fn set_active_switches(count: usize) {
    metrics::gauge!("sdn_switches_active").set(count as f64);
}
