//! JWT authentication filter.
//!
//! # Responsibilities
//! - Build one provider entry per declared authentication provider
//! - Turn per-selector auth rules into requirement expressions
//! - Key requirements by the operation tag the path matcher publishes
//!
//! # Design Decisions
//! - A single raw requirement collapses to a leaf, never a one-element
//!   `requires_any`
//! - Providers and requirements are `BTreeMap`s so output is sorted by key

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::GeneratorOptions;
use crate::filters::{split_optional, split_trimmed, Seconds, JWT_PAYLOAD_METADATA_NAME};
use crate::service::model::AuthRequirement;
use crate::service::ServiceInfo;

/// Filter state key holding the operation resolved by the path matcher.
pub const OPERATION_FILTER_STATE: &str = "envoy.filters.http.path_matcher.operation";

/// Header the verified payload is forwarded to the backend in.
pub const FORWARD_PAYLOAD_HEADER: &str = "X-Endpoint-API-UserInfo";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub providers: BTreeMap<String, JwtProvider>,
    pub filter_state_rules: FilterStateRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtProvider {
    pub issuer: String,
    pub remote_jwks: RemoteJwks,
    pub from_headers: Vec<JwtHeader>,
    pub from_params: Vec<String>,
    pub forward_payload_header: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiences: Option<Vec<String>>,
    pub payload_in_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteJwks {
    pub http_uri: JwksUri,
    pub cache_duration: Seconds,
}

/// Key-set location. The cluster is named after the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwksUri {
    pub uri: String,
    pub cluster: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtHeader {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterStateRule {
    pub name: String,
    pub requires: BTreeMap<String, JwtRequirement>,
}

/// Boolean policy over providers that a token must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JwtRequirement {
    ProviderName(String),
    ProviderAndAudiences(ProviderWithAudiences),
    RequiresAny(JwtRequirementOrList),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderWithAudiences {
    pub provider_name: String,
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtRequirementOrList {
    pub requirements: Vec<JwtRequirement>,
}

/// Build the JWT config, or `None` when the service declares no provider.
pub fn build(info: &ServiceInfo, opts: &GeneratorOptions) -> Option<FilterConfig> {
    let auth = &info.service_config().authentication;

    let providers: BTreeMap<String, JwtProvider> = auth
        .providers
        .iter()
        .map(|p| {
            let provider = JwtProvider {
                issuer: p.issuer.clone(),
                remote_jwks: RemoteJwks {
                    http_uri: JwksUri {
                        uri: p.jwks_uri.clone(),
                        cluster: p.issuer.clone(),
                    },
                    cache_duration: Seconds(opts.jwt.jwks_cache_duration_secs),
                },
                from_headers: vec![
                    JwtHeader {
                        name: "Authorization".to_string(),
                        value_prefix: "Bearer ".to_string(),
                    },
                    JwtHeader {
                        name: "X-Goog-Iap-Jwt-Assertion".to_string(),
                        value_prefix: String::new(),
                    },
                ],
                from_params: vec!["access_token".to_string()],
                forward_payload_header: FORWARD_PAYLOAD_HEADER.to_string(),
                audiences: split_optional(&p.audiences),
                payload_in_metadata: JWT_PAYLOAD_METADATA_NAME.to_string(),
            };
            (p.id.clone(), provider)
        })
        .collect();

    if providers.is_empty() {
        return None;
    }

    let requires = auth
        .rules
        .iter()
        .filter(|rule| !rule.requirements.is_empty())
        .map(|rule| (rule.selector.clone(), make_requirement(&rule.requirements)))
        .collect();

    Some(FilterConfig {
        providers,
        filter_state_rules: FilterStateRule {
            name: OPERATION_FILTER_STATE.to_string(),
            requires,
        },
    })
}

/// Combine raw requirements. Callers pass at least one requirement.
pub fn make_requirement(requirements: &[AuthRequirement]) -> JwtRequirement {
    let mut leaves: Vec<JwtRequirement> = requirements.iter().map(make_leaf).collect();
    if leaves.len() == 1 {
        return leaves.remove(0);
    }
    JwtRequirement::RequiresAny(JwtRequirementOrList {
        requirements: leaves,
    })
}

fn make_leaf(requirement: &AuthRequirement) -> JwtRequirement {
    if requirement.audiences.is_empty() {
        JwtRequirement::ProviderName(requirement.provider_id.clone())
    } else {
        JwtRequirement::ProviderAndAudiences(ProviderWithAudiences {
            provider_name: requirement.provider_id.clone(),
            audiences: split_trimmed(&requirement.audiences),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceConfig;
    use serde_json::{json, Value};

    fn service(value: Value) -> ServiceInfo {
        let config: ServiceConfig = serde_json::from_value(value).unwrap();
        ServiceInfo::from_service_config(config).unwrap()
    }

    fn requirement(provider_id: &str, audiences: &str) -> AuthRequirement {
        AuthRequirement {
            provider_id: provider_id.to_string(),
            audiences: audiences.to_string(),
        }
    }

    #[test]
    fn test_single_requirement_collapses_to_leaf() {
        let expr = make_requirement(&[requirement("I", "")]);
        assert_eq!(expr, JwtRequirement::ProviderName("I".into()));
        assert_eq!(serde_json::to_value(&expr).unwrap(), json!({"provider_name": "I"}));

        let expr = make_requirement(&[requirement("I", "a.com, b.com")]);
        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            json!({"provider_and_audiences": {"provider_name": "I", "audiences": ["a.com", "b.com"]}})
        );
    }

    #[test]
    fn test_multiple_requirements_keep_order() {
        let expr = make_requirement(&[requirement("b", ""), requirement("a", "x,y")]);
        assert_eq!(
            serde_json::to_value(&expr).unwrap(),
            json!({"requires_any": {"requirements": [
                {"provider_name": "b"},
                {"provider_and_audiences": {"provider_name": "a", "audiences": ["x", "y"]}}
            ]}})
        );
    }

    #[test]
    fn test_filter_config() {
        let info = service(json!({
            "name": "svc",
            "apis": [{"name": "a", "methods": [{"name": "Foo"}, {"name": "Bar"}, {"name": "Baz"}]}],
            "authentication": {
                "providers": [
                    {"id": "firebase", "issuer": "https://securetoken.google.com",
                     "jwks_uri": "https://www.googleapis.com/jwks", "audiences": "aud1 , aud2"},
                    {"id": "auth0", "issuer": "https://auth0.example.com/",
                     "jwks_uri": "https://auth0.example.com/.well-known/jwks.json"}
                ],
                "rules": [
                    {"selector": "a.Foo", "requirements": [{"provider_id": "firebase"}]},
                    {"selector": "a.Bar", "requirements": [
                        {"provider_id": "firebase"}, {"provider_id": "auth0", "audiences": "bar"}
                    ]},
                    {"selector": "a.Baz", "requirements": []}
                ]
            }
        }));

        let config = build(&info, &GeneratorOptions::default()).unwrap();
        assert_eq!(
            serde_json::to_value(&config).unwrap(),
            json!({
                "providers": {
                    "auth0": {
                        "issuer": "https://auth0.example.com/",
                        "remote_jwks": {
                            "http_uri": {
                                "uri": "https://auth0.example.com/.well-known/jwks.json",
                                "cluster": "https://auth0.example.com/"
                            },
                            "cache_duration": "300s"
                        },
                        "from_headers": [
                            {"name": "Authorization", "value_prefix": "Bearer "},
                            {"name": "X-Goog-Iap-Jwt-Assertion"}
                        ],
                        "from_params": ["access_token"],
                        "forward_payload_header": "X-Endpoint-API-UserInfo",
                        "payload_in_metadata": "jwt_payloads"
                    },
                    "firebase": {
                        "issuer": "https://securetoken.google.com",
                        "remote_jwks": {
                            "http_uri": {
                                "uri": "https://www.googleapis.com/jwks",
                                "cluster": "https://securetoken.google.com"
                            },
                            "cache_duration": "300s"
                        },
                        "from_headers": [
                            {"name": "Authorization", "value_prefix": "Bearer "},
                            {"name": "X-Goog-Iap-Jwt-Assertion"}
                        ],
                        "from_params": ["access_token"],
                        "forward_payload_header": "X-Endpoint-API-UserInfo",
                        "audiences": ["aud1", "aud2"],
                        "payload_in_metadata": "jwt_payloads"
                    }
                },
                "filter_state_rules": {
                    "name": "envoy.filters.http.path_matcher.operation",
                    "requires": {
                        "a.Bar": {"requires_any": {"requirements": [
                            {"provider_name": "firebase"},
                            {"provider_and_audiences": {"provider_name": "auth0", "audiences": ["bar"]}}
                        ]}},
                        "a.Foo": {"provider_name": "firebase"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_no_providers_means_no_filter() {
        let info = service(json!({
            "name": "svc",
            "apis": [{"name": "a", "methods": [{"name": "Foo"}]}],
            "authentication": {"rules": [
                {"selector": "a.Foo", "requirements": [{"provider_id": "ghost"}]}
            ]}
        }));
        assert_eq!(build(&info, &GeneratorOptions::default()), None);
    }
}
