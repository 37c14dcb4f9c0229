use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

// Metric name constants
pub const ACQUIRES_GRANTED: &str = "perflock_acquires_granted_total";
pub const ACQUIRES_DENIED: &str = "perflock_acquires_denied_total";
pub const PROTOCOL_ERRORS: &str = "perflock_protocol_errors_total";
pub const GOVERNOR_ERRORS: &str = "perflock_governor_errors_total";
pub const SESSIONS_ACTIVE: &str = "perflock_sessions_active";
pub const QUEUE_LENGTH: &str = "perflock_queue_length";

/// Installs the global Prometheus recorder and serves it on `addr`.
pub fn init_prometheus_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;

    ::metrics::describe_counter!(ACQUIRES_GRANTED, "Lock acquisitions granted");
    ::metrics::describe_counter!(ACQUIRES_DENIED, "Non-blocking lock acquisitions denied");
    ::metrics::describe_counter!(PROTOCOL_ERRORS, "Connections dropped for protocol violations");
    ::metrics::describe_counter!(GOVERNOR_ERRORS, "Failed governor applies and restores");
    ::metrics::describe_gauge!(SESSIONS_ACTIVE, "Open client connections");
    ::metrics::describe_gauge!(QUEUE_LENGTH, "Held and pending lock requests");
    Ok(())
}

/// Adds a granted acquisition.
pub fn add_granted() {
    ::metrics::counter!(ACQUIRES_GRANTED).increment(1);
}

/// Adds a denied non-blocking acquisition.
pub fn add_denied() {
    ::metrics::counter!(ACQUIRES_DENIED).increment(1);
}

pub fn add_protocol_error() {
    ::metrics::counter!(PROTOCOL_ERRORS).increment(1);
}

pub fn add_governor_error() {
    ::metrics::counter!(GOVERNOR_ERRORS).increment(1);
}

pub fn session_opened() {
    ::metrics::gauge!(SESSIONS_ACTIVE).increment(1.0);
}

pub fn session_closed() {
    ::metrics::gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

/// Sets the number of queued requests, holders included.
pub fn set_queue_length(len: usize) {
    ::metrics::gauge!(QUEUE_LENGTH).set(len as f64);
}
