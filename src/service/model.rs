//! Service configuration input shape.
//!
//! Mirrors the JSON rendering of a published service configuration. Only the
//! sections the compiler consumes are modelled; everything else is ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root of a service configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name (e.g., "bookstore.endpoints.project.cloud.goog").
    pub name: String,

    /// Config rollout identifier.
    pub id: String,

    pub producer_project_id: String,

    pub apis: Vec<Api>,
    pub http: Http,
    pub backend: Backend,
    pub authentication: Authentication,
    pub usage: Usage,
    pub quota: Quota,
    pub system_parameters: SystemParameters,
    pub control: Control,
    pub endpoints: Vec<Endpoint>,
    pub types: Vec<Type>,

    // Telemetry sections are passed through untouched to the accounting filter.
    pub logs: Option<Value>,
    pub metrics: Option<Value>,
    pub monitored_resources: Option<Value>,
    pub monitoring: Option<Value>,
    pub logging: Option<Value>,

    pub source_info: SourceInfo,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Api {
    pub name: String,
    pub methods: Vec<ApiMethod>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiMethod {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Http {
    pub rules: Vec<HttpRule>,
}

/// HTTP binding for one method. At most one verb field is set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpRule {
    pub selector: String,
    pub get: Option<String>,
    pub put: Option<String>,
    pub post: Option<String>,
    pub delete: Option<String>,
    pub patch: Option<String>,
    pub custom: Option<CustomPattern>,
    pub body: String,
    pub additional_bindings: Vec<HttpRule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CustomPattern {
    pub kind: String,
    pub path: String,
}

impl HttpRule {
    /// The (verb, template) pair this rule binds, if any.
    pub fn pattern(&self) -> Option<(String, String)> {
        let verbs = [
            ("GET", &self.get),
            ("PUT", &self.put),
            ("POST", &self.post),
            ("DELETE", &self.delete),
            ("PATCH", &self.patch),
        ];
        for (verb, path) in verbs {
            if let Some(path) = path {
                return Some((verb.to_string(), path.clone()));
            }
        }
        self.custom
            .as_ref()
            .map(|c| (c.kind.to_ascii_uppercase(), c.path.clone()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Backend {
    pub rules: Vec<BackendRuleConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendRuleConfig {
    pub selector: String,
    pub address: String,
    pub path_translation: PathTranslation,
    pub jwt_audience: String,
}

/// How the gateway rewrites the request path towards the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathTranslation {
    #[default]
    PathTranslationUnspecified,
    ConstantAddress,
    AppendPathToAddress,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Authentication {
    pub providers: Vec<AuthProvider>,
    pub rules: Vec<AuthenticationRule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthProvider {
    pub id: String,
    pub issuer: String,
    pub jwks_uri: String,
    /// Comma-separated audiences; empty means unrestricted.
    pub audiences: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthenticationRule {
    pub selector: String,
    pub requirements: Vec<AuthRequirement>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthRequirement {
    pub provider_id: String,
    /// Comma-separated audiences; empty means "provider only".
    pub audiences: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Usage {
    pub rules: Vec<UsageRule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UsageRule {
    pub selector: String,
    pub allow_unregistered_calls: bool,
    pub skip_service_control: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Quota {
    pub metric_rules: Vec<MetricRule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricRule {
    pub selector: String,
    pub metric_costs: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemParameters {
    pub rules: Vec<SystemParameterRule>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemParameterRule {
    pub selector: String,
    pub parameters: Vec<SystemParameter>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemParameter {
    pub name: String,
    pub http_header: String,
    pub url_query_parameter: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Control {
    pub environment: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoint {
    pub name: String,
    pub allow_cors: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Type {
    pub name: String,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Field {
    pub name: String,
    pub json_name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceInfo {
    pub source_files: Vec<SourceFile>,
}

/// An artifact the service configuration was built from.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceFile {
    pub file_path: String,
    #[serde(with = "crate::service::base64_bytes")]
    pub file_contents: Vec<u8>,
    pub file_type: FileType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    #[default]
    FileTypeUnspecified,
    ServiceConfigYaml,
    OpenApiJson,
    OpenApiYaml,
    FileDescriptorSetProto,
    ProtoFile,
    #[serde(other)]
    Unknown,
}
