//! Options validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs the data plane will dial
//! - Validate value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GeneratorOptions → Result<(), Vec<ValidationError>>
//! - Runs before options are handed to the compiler
//! - Cross-field conflicts that depend on the compiled stages (backend routing
//!   with a key file) are reported by the compiler, not here

use thiserror::Error;
use url::Url;

use crate::config::schema::GeneratorOptions;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.address must not be empty")]
    EmptyListenerAddress,

    #[error("{field} is not an absolute http(s) URL: {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("jwt.jwks_cache_duration_secs must be greater than zero")]
    ZeroJwksCacheDuration,

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Validate generator options.
pub fn validate_options(opts: &GeneratorOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if opts.listener.address.trim().is_empty() {
        errors.push(ValidationError::EmptyListenerAddress);
    }

    check_url(&mut errors, "credentials.metadata_url", &opts.credentials.metadata_url);
    check_url(&mut errors, "credentials.iam_url", &opts.credentials.iam_url);
    if !opts.service_control.url.is_empty() {
        check_url(&mut errors, "service_control.url", &opts.service_control.url);
    }

    if opts.jwt.jwks_cache_duration_secs == 0 {
        errors.push(ValidationError::ZeroJwksCacheDuration);
    }

    let level = opts.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(
            opts.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let valid = Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}
