//! HTTP filter builders.
//!
//! # Data Flow
//! ```text
//! ServiceInfo + GeneratorOptions
//!     → path_matcher.rs    (operation tagging, path parameters)
//!     → jwt_authn.rs       (providers, requirement expressions)
//!     → service_control.rs (accounting requirements)
//!     → transcoder.rs      (descriptor-based transcoding)
//!     → backend_auth.rs    (backend identity tokens)
//!     → backend_routing.rs (address translation)
//!     → router.rs          (cors, grpc-web, terminal router)
//!     → HttpFilter { name, config }
//! ```
//!
//! # Design Decisions
//! - Builders are pure: same input, same output, no I/O
//! - Builders never touch the filter list; the listener assembler owns order
//! - Typed configs serialize to `serde_json::Value`; maps are `BTreeMap` so
//!   output is byte-stable

pub mod backend_auth;
pub mod backend_routing;
pub mod jwt_authn;
pub mod path_matcher;
pub mod router;
pub mod service_control;
pub mod transcoder;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::GeneratorOptions;

// Filter identifiers understood by the data plane.
pub const CORS: &str = "envoy.cors";
pub const PATH_MATCHER: &str = "envoy.filters.http.path_matcher";
pub const JWT_AUTHN: &str = "envoy.filters.http.jwt_authn";
pub const SERVICE_CONTROL: &str = "envoy.filters.http.service_control";
pub const GRPC_JSON_TRANSCODER: &str = "envoy.grpc_json_transcoder";
pub const GRPC_WEB: &str = "envoy.grpc_web";
pub const BACKEND_AUTH: &str = "envoy.filters.http.backend_auth";
pub const BACKEND_ROUTING: &str = "envoy.filters.http.backend_routing";
pub const ROUTER: &str = "envoy.router";

/// Dynamic metadata key under which verified JWT payloads are published.
pub const JWT_PAYLOAD_METADATA_NAME: &str = "jwt_payloads";

pub const METADATA_CLUSTER: &str = "metadata-cluster";
pub const IAM_CLUSTER: &str = "iam-cluster";
pub const TOKEN_AGENT_CLUSTER: &str = "token-agent-cluster";
pub const SERVICE_CONTROL_CLUSTER: &str = "service-control-cluster";

const ACCESS_TOKEN_SUFFIX: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const IDENTITY_TOKEN_SUFFIX: &str =
    "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Timeout for every control call the data plane makes on our behalf.
pub const CALL_TIMEOUT_SECS: u64 = 5;

/// One entry of the HTTP filter chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpFilter {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl HttpFilter {
    /// A filter that carries no configuration.
    pub fn bare(name: &'static str) -> Self {
        Self { name, config: None }
    }

    /// A filter whose configuration is the JSON form of `config`.
    pub fn with_config<T: Serialize>(
        name: &'static str,
        config: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name,
            config: Some(serde_json::to_value(config)?),
        })
    }
}

/// Whole-second duration in the `"5s"` JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seconds(pub u64);

impl Serialize for Seconds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{}s", self.0))
    }
}

/// Upstream endpoint with the logical cluster that reaches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpUri {
    pub uri: String,
    pub cluster: String,
    pub timeout: Seconds,
}

impl HttpUri {
    /// Endpoint called with the standard control-call timeout.
    pub fn new(uri: impl Into<String>, cluster: &str) -> Self {
        Self {
            uri: uri.into(),
            cluster: cluster.to_string(),
            timeout: Seconds(CALL_TIMEOUT_SECS),
        }
    }
}

/// Where the data plane obtains OAuth access tokens for its own calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessToken {
    RemoteToken(HttpUri),
}

impl AccessToken {
    /// Metadata server when running on-platform, otherwise the local token
    /// agent that holds the key file.
    pub fn from_options(opts: &GeneratorOptions) -> Self {
        let creds = &opts.credentials;
        if creds.service_account_key.is_empty() {
            AccessToken::RemoteToken(HttpUri::new(
                format!("{}{}", trim_base(&creds.metadata_url), ACCESS_TOKEN_SUFFIX),
                METADATA_CLUSTER,
            ))
        } else {
            AccessToken::RemoteToken(HttpUri::new(
                format!("http://127.0.0.1:{}/local/access_token", creds.token_agent_port),
                TOKEN_AGENT_CLUSTER,
            ))
        }
    }
}

/// Metadata server endpoint that mints identity tokens for the instance.
pub(crate) fn identity_token_uri(opts: &GeneratorOptions) -> String {
    format!(
        "{}{}",
        trim_base(&opts.credentials.metadata_url),
        IDENTITY_TOKEN_SUFFIX
    )
}

/// Base URL without trailing slashes, ready for a path suffix.
pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Split a comma-separated list and trim every entry.
pub fn split_trimmed(list: &str) -> Vec<String> {
    list.split(',').map(|s| s.trim().to_string()).collect()
}

/// Like [`split_trimmed`], but `None` for an empty list.
pub fn split_optional(list: &str) -> Option<Vec<String>> {
    (!list.is_empty()).then(|| split_trimmed(list))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_trimmed() {
        assert_eq!(split_trimmed("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(split_optional(""), None);
        assert_eq!(split_optional(" x "), Some(vec!["x".to_string()]));
    }

    #[test]
    fn test_http_uri_json() {
        let uri = HttpUri::new("http://169.254.169.254/x", METADATA_CLUSTER);
        assert_eq!(
            serde_json::to_value(&uri).unwrap(),
            json!({"uri": "http://169.254.169.254/x", "cluster": "metadata-cluster", "timeout": "5s"})
        );
    }

    #[test]
    fn test_access_token_source() {
        let mut opts = GeneratorOptions::default();
        assert_eq!(
            serde_json::to_value(AccessToken::from_options(&opts)).unwrap(),
            json!({"remote_token": {
                "uri": "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token",
                "cluster": "metadata-cluster",
                "timeout": "5s"
            }})
        );

        opts.credentials.service_account_key = "/etc/key.json".into();
        assert_eq!(
            serde_json::to_value(AccessToken::from_options(&opts)).unwrap(),
            json!({"remote_token": {
                "uri": "http://127.0.0.1:8791/local/access_token",
                "cluster": "token-agent-cluster",
                "timeout": "5s"
            }})
        );
    }

    #[test]
    fn test_trailing_slash_on_metadata_url() {
        let mut opts = GeneratorOptions::default();
        opts.credentials.metadata_url = "http://169.254.169.254/".into();
        let token = serde_json::to_value(AccessToken::from_options(&opts)).unwrap();
        assert_eq!(
            token["remote_token"]["uri"],
            "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token"
        );
        assert_eq!(
            identity_token_uri(&opts),
            "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/identity"
        );
    }

    #[test]
    fn test_bare_filter_omits_config() {
        assert_eq!(
            serde_json::to_value(HttpFilter::bare(CORS)).unwrap(),
            json!({"name": "envoy.cors"})
        );
    }
}
