//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load options → Validate → Load service → Compile → Render
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → stop the watch loop
//! ```
//!
//! # Design Decisions
//! - Every pass re-reads both inputs; nothing is cached between passes
//! - A pass either yields complete output or an error, never partial output

pub mod signals;
pub mod startup;
