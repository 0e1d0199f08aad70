//! Configless filters and the terminal router.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::GeneratorOptions;
use crate::filters::{HttpFilter, CORS, GRPC_WEB};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterConfig {
    pub suppress_envoy_headers: bool,
    pub start_child_span: bool,
}

/// Router settings; always the last filter.
pub fn build(opts: &GeneratorOptions) -> RouterConfig {
    RouterConfig {
        suppress_envoy_headers: opts.listener.suppress_envoy_headers,
        start_child_span: opts.observability.enable_tracing,
    }
}

/// CORS is interpreted downstream from the preset; it carries no config.
pub fn cors_filter() -> HttpFilter {
    HttpFilter::bare(CORS)
}

pub fn grpc_web_filter() -> HttpFilter {
    HttpFilter {
        name: GRPC_WEB,
        config: Some(Value::Object(Map::new())),
    }
}
