//! Prometheus metrics functionality.
//!
//! Metrics go through the `metrics` facade. Without an installed recorder
//! every call is a no-op; [`init_prometheus_exporter`] installs one with an
//! HTTP scrape endpoint.

pub mod meter;

pub use meter::*;
