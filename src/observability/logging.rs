//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level
//! - Logs go to stderr so compiled output can be piped from stdout

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive for a configured level.
pub fn default_directive(level: &str) -> String {
    format!("gateway_configgen={level},configgen={level}")
}

/// Install the global subscriber. Call once, from the binary.
pub fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directive(level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(
            default_directive("debug"),
            "gateway_configgen=debug,configgen=debug"
        );
    }
}
