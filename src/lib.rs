//! Gateway filter-chain compiler library.

pub mod config;
pub mod filters;
pub mod lifecycle;
pub mod listener;
pub mod observability;
pub mod service;

pub use config::schema::GeneratorOptions;
pub use listener::{compile, CompileError, Listener};
pub use service::ServiceInfo;
