//! Filter chain assembly.
//!
//! # Responsibilities
//! - Walk the fixed stage table and collect the filters each stage yields
//! - Reject conflicting options before anything is emitted
//! - Wrap the chain in the connection manager envelope
//!
//! # Stage Order
//! ```text
//! cors → path_matcher → jwt_authn → service_control
//!      → grpc_json_transcoder + grpc_web
//!      → backend_auth + backend_routing
//!      → router
//! ```

use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{BackendProtocol, GeneratorOptions};
use crate::filters::{
    self, backend_auth, backend_routing, jwt_authn, path_matcher, router, service_control,
    transcoder, HttpFilter,
};
use crate::listener::types::{
    Address, CompileError, FilterChain, HttpConnectionManager, Listener, NetworkFilter,
    SocketAddress, HTTP_CONNECTION_MANAGER,
};
use crate::observability::metrics;
use crate::service::ServiceInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Cors,
    PathMatcher,
    JwtAuthn,
    ServiceControl,
    Transcoding,
    BackendRouting,
    Router,
}

const ORDER: [Stage; 7] = [
    Stage::Cors,
    Stage::PathMatcher,
    Stage::JwtAuthn,
    Stage::ServiceControl,
    Stage::Transcoding,
    Stage::BackendRouting,
    Stage::Router,
];

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Cors => "cors",
            Stage::PathMatcher => "path_matcher",
            Stage::JwtAuthn => "jwt_authn",
            Stage::ServiceControl => "service_control",
            Stage::Transcoding => "transcoding",
            Stage::BackendRouting => "backend_routing",
            Stage::Router => "router",
        }
    }

    fn build(
        self,
        info: &ServiceInfo,
        opts: &GeneratorOptions,
    ) -> Result<Vec<HttpFilter>, CompileError> {
        let built = match self {
            Stage::Cors => {
                if !opts.cors.preset.is_enabled() {
                    return Ok(Vec::new());
                }
                vec![router::cors_filter()]
            }
            Stage::PathMatcher => {
                optional(filters::PATH_MATCHER, path_matcher::build(info, opts))
            }
            Stage::JwtAuthn => {
                if opts.jwt.skip_filter {
                    tracing::debug!("jwt_authn filter skipped by option");
                    return Ok(Vec::new());
                }
                optional(filters::JWT_AUTHN, jwt_authn::build(info, opts))
            }
            Stage::ServiceControl => {
                if opts.service_control.skip_filter {
                    tracing::debug!("service_control filter skipped by option");
                    return Ok(Vec::new());
                }
                optional(filters::SERVICE_CONTROL, service_control::build(info, opts))
            }
            Stage::Transcoding => {
                if opts.backend.protocol != BackendProtocol::Grpc {
                    return Ok(Vec::new());
                }
                let mut built = optional(filters::GRPC_JSON_TRANSCODER, transcoder::build(info));
                built.push(router::grpc_web_filter());
                built
            }
            Stage::BackendRouting => {
                if !opts.backend.enable_routing {
                    return Ok(Vec::new());
                }
                if !opts.credentials.service_account_key.is_empty() {
                    return Err(CompileError::ConfigConflict(
                        "backend routing cannot be combined with a service account key".into(),
                    ));
                }
                let mut built = optional(
                    filters::BACKEND_AUTH,
                    Some(backend_auth::build(info, opts)),
                );
                built.extend(optional(
                    filters::BACKEND_ROUTING,
                    Some(backend_routing::build(info)),
                ));
                built
            }
            Stage::Router => {
                let filter = HttpFilter::with_config(filters::ROUTER, &router::build(opts))
                    .map_err(|source| CompileError::Serialization {
                        what: "router",
                        source,
                    })?;
                vec![filter]
            }
        };
        Ok(built)
    }
}

/// Serialize an optional stage config. A missing config or a config that
/// fails to serialize yields no filter.
fn optional<T: Serialize>(name: &'static str, config: Option<T>) -> Vec<HttpFilter> {
    let Some(config) = config else {
        tracing::debug!(filter = name, "no rules, filter omitted");
        return Vec::new();
    };
    match HttpFilter::with_config(name, &config) {
        Ok(filter) => {
            tracing::debug!(filter = name, config = ?filter.config, "filter config");
            vec![filter]
        }
        Err(e) => {
            tracing::warn!(
                filter = name,
                error = %e,
                "failed to serialize filter config, omitting"
            );
            Vec::new()
        }
    }
}

/// Ordered HTTP filters for the service.
pub fn http_filters(
    info: &ServiceInfo,
    opts: &GeneratorOptions,
) -> Result<Vec<HttpFilter>, CompileError> {
    let mut chain = Vec::new();
    for stage in ORDER {
        let built = stage.build(info, opts)?;
        if built.is_empty() {
            tracing::debug!(stage = stage.name(), "stage produced no filters");
        }
        for filter in built {
            tracing::info!(filter = filter.name, "adding filter");
            chain.push(filter);
        }
    }
    Ok(chain)
}

/// Compile the listener for one service.
pub fn compile(info: &ServiceInfo, opts: &GeneratorOptions) -> Result<Listener, CompileError> {
    let started = Instant::now();
    let result = assemble(info, opts);
    let filter_count = result.as_ref().ok().map(|(_, count)| *count);
    metrics::record_compilation(filter_count, started.elapsed());
    result.map(|(listener, _)| listener)
}

fn assemble(
    info: &ServiceInfo,
    opts: &GeneratorOptions,
) -> Result<(Listener, usize), CompileError> {
    let http_filters = http_filters(info, opts)?;
    let filter_count = http_filters.len();

    let hcm = HttpConnectionManager {
        codec_type: "AUTO",
        stat_prefix: "ingress_http",
        use_remote_address: opts.listener.use_remote_address,
        xff_num_trusted_hops: opts.listener.xff_num_trusted_hops,
        tracing: opts
            .observability
            .enable_tracing
            .then(|| Value::Object(Map::new())),
        http_filters,
    };
    let config = serde_json::to_value(&hcm).map_err(|source| CompileError::Serialization {
        what: "http connection manager",
        source,
    })?;

    let listener = Listener {
        address: Address {
            socket_address: SocketAddress {
                address: opts.listener.address.clone(),
                port_value: opts.listener.port,
            },
        },
        filter_chains: vec![FilterChain {
            filters: vec![NetworkFilter {
                name: HTTP_CONNECTION_MANAGER,
                config,
            }],
        }],
    };

    tracing::info!(
        service = info.name(),
        address = %opts.listener.address,
        port = opts.listener.port,
        filters = filter_count,
        "listener compiled"
    );
    Ok((listener, filter_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsPreset;
    use crate::service::ServiceConfig;
    use serde_json::json;

    fn service(value: Value) -> ServiceInfo {
        let config: ServiceConfig = serde_json::from_value(value).unwrap();
        ServiceInfo::from_service_config(config).unwrap()
    }

    fn bookstore() -> ServiceInfo {
        service(json!({
            "name": "bookstore.endpoints.project123.cloud.goog",
            "id": "2019-01-01r0",
            "apis": [{"name": "endpoints.examples.bookstore.Bookstore",
                      "methods": [{"name": "ListShelves"}, {"name": "CreateShelf"}]}],
            "http": {"rules": [
                {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves", "get": "/v1/shelves"},
                {"selector": "endpoints.examples.bookstore.Bookstore.CreateShelf", "post": "/v1/shelves"}
            ]},
            "authentication": {
                "providers": [{"id": "firebase", "issuer": "https://securetoken.google.com/p",
                               "jwks_uri": "https://www.googleapis.com/jwks"}],
                "rules": [{"selector": "endpoints.examples.bookstore.Bookstore.CreateShelf",
                           "requirements": [{"provider_id": "firebase"}]}]
            },
            "control": {"environment": "servicecontrol.googleapis.com"},
            "backend": {"rules": [
                {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves",
                 "address": "https://backend.run.app", "path_translation": "APPEND_PATH_TO_ADDRESS",
                 "jwt_audience": "https://backend.run.app"}
            ]},
            "source_info": {"source_files": [
                {"file_path": "api_descriptor.pb", "file_contents": "cmF3RGVzY3JpcHRvcg==",
                 "file_type": "FILE_DESCRIPTOR_SET_PROTO"}
            ]}
        }))
    }

    #[test]
    fn test_full_chain_order() {
        let mut opts = GeneratorOptions::default();
        opts.cors.preset = CorsPreset::Basic;
        opts.backend.protocol = BackendProtocol::Grpc;
        opts.backend.enable_routing = true;

        let listener = compile(&bookstore(), &opts).unwrap();
        assert_eq!(
            listener.http_filter_names(),
            vec![
                filters::CORS,
                filters::PATH_MATCHER,
                filters::JWT_AUTHN,
                filters::SERVICE_CONTROL,
                filters::GRPC_JSON_TRANSCODER,
                filters::GRPC_WEB,
                filters::BACKEND_AUTH,
                filters::BACKEND_ROUTING,
                filters::ROUTER,
            ]
        );
    }

    #[test]
    fn test_minimal_chain_is_router_only() {
        let info = service(json!({"name": "svc", "apis": [{"name": "a"}]}));
        let listener = compile(&info, &GeneratorOptions::default()).unwrap();
        assert_eq!(listener.http_filter_names(), vec![filters::ROUTER]);
        assert_eq!(
            listener.http_filter(filters::ROUTER),
            Some(&json!({"suppress_envoy_headers": true, "start_child_span": false}))
        );
    }

    #[test]
    fn test_skip_options_drop_stages() {
        let mut opts = GeneratorOptions::default();
        opts.jwt.skip_filter = true;
        opts.service_control.skip_filter = true;

        let listener = compile(&bookstore(), &opts).unwrap();
        assert_eq!(
            listener.http_filter_names(),
            vec![filters::PATH_MATCHER, filters::ROUTER]
        );
    }

    #[test]
    fn test_grpc_without_descriptor_keeps_grpc_web() {
        let info = service(json!({
            "name": "svc",
            "apis": [{"name": "pkg.Svc", "methods": [{"name": "Get"}]}]
        }));
        let mut opts = GeneratorOptions::default();
        opts.backend.protocol = BackendProtocol::Grpc;

        let listener = compile(&info, &opts).unwrap();
        assert_eq!(
            listener.http_filter_names(),
            vec![filters::PATH_MATCHER, filters::GRPC_WEB, filters::ROUTER]
        );
        assert_eq!(listener.http_filter(filters::GRPC_WEB), Some(&json!({})));
    }

    #[test]
    fn test_routing_with_key_is_a_conflict() {
        let mut opts = GeneratorOptions::default();
        opts.backend.enable_routing = true;
        opts.credentials.service_account_key = "/etc/creds/key.json".into();

        let err = compile(&bookstore(), &opts).unwrap_err();
        assert!(matches!(err, CompileError::ConfigConflict(_)));
    }

    #[test]
    fn test_key_without_routing_is_fine() {
        let mut opts = GeneratorOptions::default();
        opts.credentials.service_account_key = "/etc/creds/key.json".into();
        assert!(compile(&bookstore(), &opts).is_ok());
    }

    #[test]
    fn test_envelope() {
        let mut opts = GeneratorOptions::default();
        opts.listener.port = 9000;
        opts.observability.enable_tracing = true;

        let listener = compile(&service(json!({"name": "svc", "apis": [{"name": "a"}]})), &opts)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&listener).unwrap(),
            json!({
                "address": {"socket_address": {"address": "0.0.0.0", "port_value": 9000}},
                "filter_chains": [{"filters": [{
                    "name": "envoy.http_connection_manager",
                    "config": {
                        "codec_type": "AUTO",
                        "stat_prefix": "ingress_http",
                        "use_remote_address": false,
                        "xff_num_trusted_hops": 2,
                        "tracing": {},
                        "http_filters": [{
                            "name": "envoy.router",
                            "config": {"suppress_envoy_headers": true, "start_child_span": true}
                        }]
                    }
                }]}]
            })
        );
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("cannot serialize"))
        }
    }

    #[test]
    fn test_optional_stage_omitted_on_serialize_failure() {
        assert!(optional(filters::PATH_MATCHER, Some(Unserializable)).is_empty());
        assert!(optional::<Value>(filters::PATH_MATCHER, None).is_empty());

        let built = optional(filters::PATH_MATCHER, Some(json!({"rules": []})));
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].config, Some(json!({"rules": []})));
    }

    #[test]
    fn test_output_is_deterministic() {
        let mut opts = GeneratorOptions::default();
        opts.backend.protocol = BackendProtocol::Grpc;
        opts.backend.enable_routing = true;

        let first = compile(&bookstore(), &opts).unwrap().to_json_pretty().unwrap();
        let second = compile(&bookstore(), &opts).unwrap().to_json_pretty().unwrap();
        assert_eq!(first, second);
    }
}
