//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Library code produces:
//!     → tracing macros (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! The binary decides where they go:
//!     → logging.rs (stderr subscriber; stdout is reserved for output)
//!     → metrics.rs (Prometheus scrape endpoint, watch mode only)
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder
//! - Without a recorder the metrics facade is a no-op

pub mod logging;
pub mod metrics;
