//! Metrics collection and exposition.
//!
//! # Metrics
//! - `configgen_compilations_total` (counter): passes by `outcome` (ok, error)
//! - `configgen_compile_duration_seconds` (histogram): time per pass
//! - `configgen_http_filters` (gauge): filters in the last successful chain

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const COMPILATIONS_TOTAL: &str = "configgen_compilations_total";
pub const COMPILE_DURATION_SECONDS: &str = "configgen_compile_duration_seconds";
pub const HTTP_FILTERS: &str = "configgen_http_filters";

/// Serve Prometheus metrics on `addr`. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics exporter listening");
    Ok(())
}

/// Record one compilation pass. `filters` is `None` when the pass failed.
pub fn record_compilation(filters: Option<usize>, elapsed: Duration) {
    let outcome = if filters.is_some() { "ok" } else { "error" };
    metrics::counter!(COMPILATIONS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(COMPILE_DURATION_SECONDS).record(elapsed.as_secs_f64());
    if let Some(count) = filters {
        metrics::gauge!(HTTP_FILTERS).set(count as f64);
    }
}
