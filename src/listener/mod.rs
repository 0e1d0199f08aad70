//! Listener compilation.
//!
//! # Data Flow
//! ```text
//! ServiceInfo + GeneratorOptions
//!     → assembler.rs (walk the stage table, call the filter builders)
//!     → Vec<HttpFilter> (ordered, router last)
//!     → types.rs (connection manager envelope, bind address)
//!     → Listener
//! ```
//!
//! # Design Decisions
//! - Stage order is a table, not control flow
//! - Optional stages that fail to serialize are dropped with a warning
//! - Only conflicts and envelope/router serialization abort a pass

pub mod assembler;
pub mod types;

pub use assembler::compile;
pub use types::{CompileError, Listener};
