//! Service control (accounting) filter.
//!
//! # Responsibilities
//! - Describe the service to the accounting client (name, config id,
//!   telemetry snapshot, logging lists)
//! - Emit one requirement per operation (skip flag, metric costs, API-key
//!   policy)
//! - Carry call timing policy and the accounting endpoint
//!
//! # Design Decisions
//! - Runs after JWT authentication so verified claims are in metadata
//! - The telemetry snapshot is best effort: a failure is logged and the
//!   filter is still emitted

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{GeneratorOptions, ServiceControlOptions};
use crate::filters::{
    split_optional, trim_base, AccessToken, HttpUri, JWT_PAYLOAD_METADATA_NAME,
    SERVICE_CONTROL_CLUSTER,
};
use crate::service::{ApiKeyLocation, MetricCost, ServiceInfo};

const SERVICE_TYPE_URL: &str = "type.googleapis.com/google.api.Service";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterConfig {
    pub services: Vec<Service>,
    pub requirements: Vec<Requirement>,
    pub access_token: AccessToken,
    pub sc_calling_config: CallingConfig,
    pub service_control_uri: HttpUri,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    pub service_name: String,
    pub service_config_id: String,
    pub producer_project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_config: Option<Value>,
    pub backend_protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_request_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_response_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_jwt_payloads: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_stream_report_interval_ms: Option<u64>,
    pub jwt_payload_metadata_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub service_name: String,
    pub operation_name: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_service_control: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metric_costs: Vec<MetricCost>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKeyRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiKeyRequirement {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub allow_without_api_key: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ApiKeyLocation>,
}

/// Runtime timing policy for check, quota and report calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallingConfig {
    pub network_fail_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_timeout_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_timeout_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_timeout_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_retries: Option<u32>,
}

impl CallingConfig {
    /// Timeouts apply above 0, retries above -1; fail-open always applies.
    pub fn from_options(sc: &ServiceControlOptions) -> Self {
        let timeout = |v: i64| (v > 0).then(|| clamp_u32(v));
        let retries = |v: i64| (v > -1).then(|| clamp_u32(v));
        Self {
            network_fail_open: sc.network_fail_open,
            check_timeout_ms: timeout(sc.check_timeout_ms),
            quota_timeout_ms: timeout(sc.quota_timeout_ms),
            report_timeout_ms: timeout(sc.report_timeout_ms),
            check_retries: retries(sc.check_retries),
            quota_retries: retries(sc.quota_retries),
            report_retries: retries(sc.report_retries),
        }
    }
}

fn clamp_u32(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Build the accounting config, or `None` when the service declares no
/// telemetry environment.
pub fn build(info: &ServiceInfo, opts: &GeneratorOptions) -> Option<FilterConfig> {
    let environment = info.control_environment();
    if environment.is_empty() {
        return None;
    }

    let sc = &opts.service_control;
    let service_name = info.name().to_string();
    let service = Service {
        service_name: service_name.clone(),
        service_config_id: info.config_id().to_string(),
        producer_project_id: info.service_config().producer_project_id.clone(),
        service_config: telemetry_snapshot(info),
        backend_protocol: opts.backend.protocol.as_str().to_string(),
        log_request_headers: split_optional(&sc.log_request_headers),
        log_response_headers: split_optional(&sc.log_response_headers),
        log_jwt_payloads: split_optional(&sc.log_jwt_payloads),
        min_stream_report_interval_ms: (sc.min_stream_report_interval_ms != 0)
            .then_some(sc.min_stream_report_interval_ms),
        jwt_payload_metadata_name: JWT_PAYLOAD_METADATA_NAME.to_string(),
    };

    let requirements = info
        .iter_methods()
        .map(|(operation, method)| {
            let mut api_key = (method.is_generated_cors || method.allow_unregistered_calls)
                .then(|| ApiKeyRequirement {
                    allow_without_api_key: true,
                    ..ApiKeyRequirement::default()
                });
            if let Some(locations) = &method.api_key_locations {
                api_key.get_or_insert_with(ApiKeyRequirement::default).locations =
                    locations.clone();
            }
            Requirement {
                service_name: service_name.clone(),
                operation_name: operation.to_string(),
                skip_service_control: method.skip_service_control,
                metric_costs: method.metric_costs.clone(),
                api_key,
            }
        })
        .collect();

    Some(FilterConfig {
        services: vec![service],
        requirements,
        access_token: AccessToken::from_options(opts),
        sc_calling_config: CallingConfig::from_options(sc),
        service_control_uri: HttpUri::new(
            service_control_uri(&sc.url, environment),
            SERVICE_CONTROL_CLUSTER,
        ),
    })
}

/// Accounting endpoint: the override when set, otherwise the environment.
pub fn service_control_uri(override_url: &str, environment: &str) -> String {
    let base = if override_url.is_empty() {
        environment
    } else {
        override_url
    };
    let base = trim_base(base);
    if base.contains("://") {
        format!("{}/v1/services/", base)
    } else {
        format!("https://{}/v1/services/", base)
    }
}

/// Copy of the telemetry sections only. The full schema never leaves the
/// control plane.
fn telemetry_snapshot(info: &ServiceInfo) -> Option<Value> {
    let config = info.service_config();
    let sections = [
        ("logs", &config.logs),
        ("metrics", &config.metrics),
        ("monitored_resources", &config.monitored_resources),
        ("monitoring", &config.monitoring),
        ("logging", &config.logging),
    ];

    let mut snapshot = Map::new();
    snapshot.insert("@type".to_string(), Value::String(SERVICE_TYPE_URL.to_string()));
    for (key, section) in sections {
        let Some(section) = section else { continue };
        if !section.is_object() && !section.is_array() {
            tracing::warn!(
                section = key,
                "failed to copy telemetry section into service control config, skipping snapshot"
            );
            return None;
        }
        snapshot.insert(key.to_string(), section.clone());
    }
    Some(Value::Object(snapshot))
}
