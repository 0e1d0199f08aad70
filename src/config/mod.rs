//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! options file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GeneratorOptions (validated, immutable)
//!
//! service config file (JSON)
//!     → loader.rs (parse)
//!     → ServiceInfo (indexed)
//!
//! On change:
//!     watcher.rs detects change
//!     → both inputs reloaded and recompiled
//!     → new output sent over a channel; failures keep the old one
//! ```
//!
//! # Design Decisions
//! - Options are immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal options files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_options, load_service, ConfigError};
pub use schema::{
    BackendOptions, BackendProtocol, CorsOptions, CorsPreset, CredentialOptions,
    GeneratorOptions, JwtOptions, ListenerOptions, ObservabilityOptions, ServiceControlOptions,
};
pub use validation::{validate_options, ValidationError};
