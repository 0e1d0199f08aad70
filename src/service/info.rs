//! Resolved policy model.
//!
//! `ServiceInfo` is the per-operation view of a service configuration that the
//! filter builders read: every selector-keyed rule has already been resolved
//! onto the operation it applies to.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::service::model::{
    BackendRuleConfig, MetricRule, PathTranslation, ServiceConfig, SystemParameterRule, UsageRule,
};

/// System parameter name that carries API keys.
const API_KEY_PARAMETER: &str = "api_key";

/// Errors raised while reading a service configuration.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service config must declare at least one api")]
    MissingApi,
}

/// HTTP verb and URI template a request is matched against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct HttpPattern {
    pub http_method: String,
    pub uri_template: String,
}

/// How the gateway reaches the backend of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendRule {
    pub translation: PathTranslation,
    pub address: String,
    pub jwt_audience: String,
}

/// Where a caller may present an API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    Query(String),
    Header(String),
}

/// Quota cost charged against one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricCost {
    pub name: String,
    pub cost: i64,
}

/// Mapping from a snake_case field name to its camelCase wire name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentName {
    pub json_name: String,
    pub snake_name: String,
}

/// Everything the compiler knows about one operation.
#[derive(Debug, Clone, Default)]
pub struct MethodInfo {
    pub short_name: String,
    pub api_name: String,
    pub http_rules: Vec<HttpPattern>,
    pub backend_rule: BackendRule,
    /// Generated OPTIONS operation answering CORS preflight.
    pub is_generated_cors: bool,
    pub allow_unregistered_calls: bool,
    pub skip_service_control: bool,
    pub api_key_locations: Option<Vec<ApiKeyLocation>>,
    pub metric_costs: Vec<MetricCost>,
}

/// Read-only policy model for one compilation pass.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Name of the first declared API.
    pub api_name: String,
    /// Operation selectors in declaration order.
    pub operations: Vec<String>,
    pub methods: BTreeMap<String, MethodInfo>,
    pub segment_names: Vec<SegmentName>,
    config: ServiceConfig,
}

impl ServiceInfo {
    /// Resolve a service configuration into the per-operation model.
    pub fn from_service_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        let api_name = config
            .apis
            .first()
            .map(|api| api.name.clone())
            .ok_or(ServiceError::MissingApi)?;

        let http_rules = collect_http_rules(&config);

        let mut operations = Vec::new();
        let mut methods = BTreeMap::new();
        for api in &config.apis {
            for method in &api.methods {
                let operation = format!("{}.{}", api.name, method.name);
                if methods.contains_key(&operation) {
                    tracing::warn!(operation = %operation, "duplicate method ignored");
                    continue;
                }
                let info = resolve_method(
                    &config,
                    &operation,
                    &api.name,
                    &method.name,
                    http_rules.get(&operation).cloned().unwrap_or_default(),
                );
                operations.push(operation.clone());
                methods.insert(operation, info);
            }
        }

        let mut info = Self {
            api_name,
            operations,
            methods,
            segment_names: collect_segment_names(&config),
            config,
        };
        if info.allows_cors() {
            info.add_cors_operations();
        }
        Ok(info)
    }

    /// The configuration this model was resolved from.
    pub fn service_config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Config rollout identifier.
    pub fn config_id(&self) -> &str {
        &self.config.id
    }

    /// Telemetry environment; empty when the service declares none.
    pub fn control_environment(&self) -> &str {
        &self.config.control.environment
    }

    /// Operations paired with their methods, in declaration order.
    pub fn iter_methods(&self) -> impl Iterator<Item = (&str, &MethodInfo)> {
        self.operations
            .iter()
            .filter_map(|op| self.methods.get(op).map(|m| (op.as_str(), m)))
    }

    fn allows_cors(&self) -> bool {
        self.config
            .endpoints
            .iter()
            .any(|e| e.name == self.config.name && e.allow_cors)
    }

    fn add_cors_operations(&mut self) {
        let explicit_options: BTreeSet<String> = self
            .methods
            .values()
            .flat_map(|m| m.http_rules.iter())
            .filter(|p| p.http_method == "OPTIONS")
            .map(|p| p.uri_template.clone())
            .collect();

        let mut seen = BTreeSet::new();
        let mut generated = Vec::new();
        let mut next_index = 0;
        for (_, method) in self.iter_methods() {
            for pattern in &method.http_rules {
                let template = &pattern.uri_template;
                if template.is_empty()
                    || explicit_options.contains(template)
                    || !seen.insert(template.clone())
                {
                    continue;
                }
                // Declared methods keep their names; generated ones take the next free index.
                let (short_name, operation) = loop {
                    let short_name = format!("CORS_{next_index}");
                    next_index += 1;
                    let operation = format!("{}.{}", method.api_name, short_name);
                    if !self.methods.contains_key(&operation) {
                        break (short_name, operation);
                    }
                };
                generated.push((
                    operation,
                    MethodInfo {
                        short_name,
                        api_name: method.api_name.clone(),
                        http_rules: vec![HttpPattern {
                            http_method: "OPTIONS".to_string(),
                            uri_template: template.clone(),
                        }],
                        backend_rule: method.backend_rule.clone(),
                        is_generated_cors: true,
                        ..MethodInfo::default()
                    },
                ));
            }
        }

        for (operation, method) in generated {
            tracing::debug!(operation = %operation, "adding CORS preflight operation");
            self.operations.push(operation.clone());
            self.methods.insert(operation, method);
        }
    }
}

/// Rules addressed by selector.
trait Selected {
    fn selector(&self) -> &str;
}

macro_rules! impl_selected {
    ($($ty:ty),*) => {
        $(impl Selected for $ty {
            fn selector(&self) -> &str {
                &self.selector
            }
        })*
    };
}

impl_selected!(BackendRuleConfig, UsageRule, MetricRule, SystemParameterRule);

/// Pick the rule that applies to `operation`. Exact selectors win over
/// wildcards; among wildcards the first declared wins.
fn select<'a, T: Selected>(rules: &'a [T], operation: &str) -> Option<&'a T> {
    rules
        .iter()
        .find(|r| r.selector() == operation)
        .or_else(|| rules.iter().find(|r| wildcard_matches(r.selector(), operation)))
}

fn wildcard_matches(selector: &str, operation: &str) -> bool {
    if selector == "*" {
        return true;
    }
    match selector.strip_suffix(".*") {
        Some(prefix) => operation
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => false,
    }
}

fn collect_http_rules(config: &ServiceConfig) -> BTreeMap<String, Vec<HttpPattern>> {
    let mut by_selector: BTreeMap<String, Vec<HttpPattern>> = BTreeMap::new();
    for rule in &config.http.rules {
        let bindings = std::iter::once(rule).chain(rule.additional_bindings.iter());
        for binding in bindings {
            if let Some((http_method, uri_template)) = binding.pattern() {
                by_selector
                    .entry(rule.selector.clone())
                    .or_default()
                    .push(HttpPattern {
                        http_method,
                        uri_template,
                    });
            }
        }
    }
    by_selector
}

fn resolve_method(
    config: &ServiceConfig,
    operation: &str,
    api_name: &str,
    short_name: &str,
    http_rules: Vec<HttpPattern>,
) -> MethodInfo {
    let backend_rule = select(&config.backend.rules, operation)
        .map(|r| BackendRule {
            translation: r.path_translation,
            address: r.address.clone(),
            jwt_audience: r.jwt_audience.clone(),
        })
        .unwrap_or_default();

    let usage = select(&config.usage.rules, operation);

    let metric_costs = select(&config.quota.metric_rules, operation)
        .map(|r| {
            r.metric_costs
                .iter()
                .map(|(name, cost)| MetricCost {
                    name: name.clone(),
                    cost: *cost,
                })
                .collect()
        })
        .unwrap_or_default();

    let api_key_locations = select(&config.system_parameters.rules, operation).and_then(|r| {
        let locations: Vec<ApiKeyLocation> = r
            .parameters
            .iter()
            .filter(|p| p.name == API_KEY_PARAMETER)
            .flat_map(|p| {
                let header = (!p.http_header.is_empty())
                    .then(|| ApiKeyLocation::Header(p.http_header.clone()));
                let query = (!p.url_query_parameter.is_empty())
                    .then(|| ApiKeyLocation::Query(p.url_query_parameter.clone()));
                header.into_iter().chain(query)
            })
            .collect();
        (!locations.is_empty()).then_some(locations)
    });

    MethodInfo {
        short_name: short_name.to_string(),
        api_name: api_name.to_string(),
        http_rules,
        backend_rule,
        is_generated_cors: false,
        allow_unregistered_calls: usage.is_some_and(|u| u.allow_unregistered_calls),
        skip_service_control: usage.is_some_and(|u| u.skip_service_control),
        api_key_locations,
        metric_costs,
    }
}

fn collect_segment_names(config: &ServiceConfig) -> Vec<SegmentName> {
    let mut seen = BTreeSet::new();
    config
        .types
        .iter()
        .flat_map(|t| t.fields.iter())
        .filter(|f| !f.json_name.is_empty() && f.json_name != f.name)
        .filter(|f| seen.insert(f.name.clone()))
        .map(|f| SegmentName {
            json_name: f.json_name.clone(),
            snake_name: f.name.clone(),
        })
        .collect()
}
