//! Generator options schema.
//!
//! This module defines every option that steers filter-chain compilation.
//! All types derive Serde traits for deserialization from an options file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root options for one compilation pass.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeneratorOptions {
    /// Listener bind settings and connection-manager toggles.
    pub listener: ListenerOptions,

    /// Backend protocol and routing.
    pub backend: BackendOptions,

    /// CORS handling.
    pub cors: CorsOptions,

    /// JWT authentication.
    pub jwt: JwtOptions,

    /// Accounting (service control) calls.
    pub service_control: ServiceControlOptions,

    /// Credentials used to mint backend and accounting tokens.
    pub credentials: CredentialOptions,

    /// Tracing and log level.
    pub observability: ObservabilityOptions,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerOptions {
    /// Bind address (e.g., "0.0.0.0").
    pub address: String,

    /// Bind port.
    pub port: u16,

    /// Trust the remote address of the downstream connection.
    pub use_remote_address: bool,

    /// Number of trusted hops in X-Forwarded-For.
    pub xff_num_trusted_hops: u32,

    /// Strip proxy-generated headers from upstream responses.
    pub suppress_envoy_headers: bool,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            use_remote_address: false,
            xff_num_trusted_hops: 2,
            suppress_envoy_headers: true,
        }
    }
}

/// Backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackendOptions {
    /// Protocol spoken by the backend.
    pub protocol: BackendProtocol,

    /// Enable per-operation backend routing and backend authentication.
    pub enable_routing: bool,
}

/// Protocol spoken by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendProtocol {
    #[default]
    Http1,
    Http2,
    Grpc,
}

impl BackendProtocol {
    /// Lower-case tag used in the accounting configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendProtocol::Http1 => "http1",
            BackendProtocol::Http2 => "http2",
            BackendProtocol::Grpc => "grpc",
        }
    }
}

impl fmt::Display for BackendProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http1" => Ok(BackendProtocol::Http1),
            "http2" => Ok(BackendProtocol::Http2),
            "grpc" => Ok(BackendProtocol::Grpc),
            other => Err(format!(
                "unknown backend protocol {:?}, expected one of http1, http2, grpc",
                other
            )),
        }
    }
}

impl TryFrom<String> for BackendProtocol {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackendProtocol> for String {
    fn from(protocol: BackendProtocol) -> Self {
        protocol.as_str().to_string()
    }
}

/// CORS settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsOptions {
    /// Which CORS behavior the data plane applies.
    pub preset: CorsPreset,
}

/// CORS preset interpreted by the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorsPreset {
    #[default]
    #[serde(alias = "")]
    None,
    Basic,
    CorsWithRegex,
}

impl CorsPreset {
    /// Whether the CORS filter belongs in the chain.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CorsPreset::None)
    }
}

/// JWT authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtOptions {
    /// Leave JWT authentication out of the chain.
    pub skip_filter: bool,

    /// How long fetched key sets are cached, in seconds.
    pub jwks_cache_duration_secs: u64,
}

impl Default for JwtOptions {
    fn default() -> Self {
        Self {
            skip_filter: false,
            jwks_cache_duration_secs: 300,
        }
    }
}

/// Accounting (service control) settings.
///
/// Timeouts apply only when `> 0`, retries only when `> -1`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceControlOptions {
    /// Leave accounting out of the chain.
    pub skip_filter: bool,

    /// Override for the accounting endpoint. Empty means "use the service's
    /// control environment".
    pub url: String,

    /// Let requests through when the accounting backend is unreachable.
    pub network_fail_open: bool,

    pub check_timeout_ms: i64,
    pub quota_timeout_ms: i64,
    pub report_timeout_ms: i64,

    pub check_retries: i64,
    pub quota_retries: i64,
    pub report_retries: i64,

    /// Comma-separated request header names to log.
    pub log_request_headers: String,

    /// Comma-separated response header names to log.
    pub log_response_headers: String,

    /// Comma-separated JWT claim names to log.
    pub log_jwt_payloads: String,

    /// Minimum interval between intermediate reports for streaming calls.
    pub min_stream_report_interval_ms: u64,
}

impl Default for ServiceControlOptions {
    fn default() -> Self {
        Self {
            skip_filter: false,
            url: String::new(),
            network_fail_open: true,
            check_timeout_ms: 0,
            quota_timeout_ms: 0,
            report_timeout_ms: 0,
            check_retries: -1,
            quota_retries: -1,
            report_retries: -1,
            log_request_headers: String::new(),
            log_response_headers: String::new(),
            log_jwt_payloads: String::new(),
            min_stream_report_interval_ms: 0,
        }
    }
}

/// Credential sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CredentialOptions {
    /// Path to a service-account key file. Set only when running off-platform.
    pub service_account_key: String,

    /// Service account to impersonate when minting backend identity tokens.
    pub iam_service_account: String,

    /// Base URL of the identity broker.
    pub iam_url: String,

    /// Base URL of the instance metadata server.
    pub metadata_url: String,

    /// Port of the local token agent used with a key file.
    pub token_agent_port: u16,
}

impl Default for CredentialOptions {
    fn default() -> Self {
        Self {
            service_account_key: String::new(),
            iam_service_account: String::new(),
            iam_url: "https://iamcredentials.googleapis.com".to_string(),
            metadata_url: "http://169.254.169.254".to_string(),
            token_agent_port: 8791,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityOptions {
    /// Emit tracing spans from the data plane.
    pub enable_tracing: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityOptions {
    fn default() -> Self {
        Self {
            enable_tracing: false,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let opts: GeneratorOptions = toml::from_str("").unwrap();
        assert_eq!(opts.listener.port, 8080);
        assert_eq!(opts.backend.protocol, BackendProtocol::Http1);
        assert_eq!(opts.cors.preset, CorsPreset::None);
        assert_eq!(opts.jwt.jwks_cache_duration_secs, 300);
        assert_eq!(opts.service_control.check_retries, -1);
        assert!(opts.service_control.network_fail_open);
    }

    #[test]
    fn test_backend_protocol_is_case_insensitive() {
        let opts: GeneratorOptions = toml::from_str(
            r#"
            [backend]
            protocol = "gRPC"
            enable_routing = true
            "#,
        )
        .unwrap();
        assert_eq!(opts.backend.protocol, BackendProtocol::Grpc);
        assert!(opts.backend.enable_routing);

        assert!("spdy".parse::<BackendProtocol>().is_err());
    }

    #[test]
    fn test_cors_preset_accepts_empty_string() {
        let opts: GeneratorOptions = toml::from_str(
            r#"
            [cors]
            preset = ""
            "#,
        )
        .unwrap();
        assert!(!opts.cors.preset.is_enabled());

        let opts: GeneratorOptions = toml::from_str(
            r#"
            [cors]
            preset = "cors_with_regex"
            "#,
        )
        .unwrap();
        assert_eq!(opts.cors.preset, CorsPreset::CorsWithRegex);
        assert!(opts.cors.preset.is_enabled());
    }
}
