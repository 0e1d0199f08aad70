//! Listener descriptor types and compile errors.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::filters::HttpFilter;

pub const HTTP_CONNECTION_MANAGER: &str = "envoy.http_connection_manager";

static NO_CONFIG: Value = Value::Null;

/// Errors that abort a compilation pass.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Two options ask for mutually exclusive behavior.
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),

    /// A mandatory part of the listener could not be serialized.
    #[error("failed to serialize {what}: {source}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Compiled listener, ready to hand to the data plane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listener {
    pub address: Address,
    pub filter_chains: Vec<FilterChain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub socket_address: SocketAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketAddress {
    pub address: String,
    pub port_value: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChain {
    pub filters: Vec<NetworkFilter>,
}

/// Network-level filter; its config is already in wire form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkFilter {
    pub name: &'static str,
    pub config: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpConnectionManager {
    pub codec_type: &'static str,
    pub stat_prefix: &'static str,
    pub use_remote_address: bool,
    pub xff_num_trusted_hops: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing: Option<Value>,
    pub http_filters: Vec<HttpFilter>,
}

impl Listener {
    fn connection_manager(&self) -> Option<&Value> {
        self.filter_chains
            .iter()
            .flat_map(|chain| chain.filters.iter())
            .find(|f| f.name == HTTP_CONNECTION_MANAGER)
            .map(|f| &f.config)
    }

    fn http_filters(&self) -> impl Iterator<Item = &Value> {
        self.connection_manager()
            .and_then(|hcm| hcm.get("http_filters"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    /// Names of the HTTP filters, in chain order.
    pub fn http_filter_names(&self) -> Vec<&str> {
        self.http_filters()
            .filter_map(|f| f.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Config of the named HTTP filter. `Some(Value::Null)` for a bare filter.
    pub fn http_filter(&self, name: &str) -> Option<&Value> {
        self.http_filters()
            .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
            .map(|f| f.get("config").unwrap_or(&NO_CONFIG))
    }

    pub fn to_json_pretty(&self) -> Result<String, CompileError> {
        serde_json::to_string_pretty(self).map_err(|source| CompileError::Serialization {
            what: "listener",
            source,
        })
    }
}
