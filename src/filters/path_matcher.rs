//! Path matcher filter.
//!
//! Tags every request with the operation it resolves to. Every later filter
//! that keys by operation reads that tag, so this filter must run first.

use serde::Serialize;

use crate::config::{BackendProtocol, GeneratorOptions};
use crate::service::{HttpPattern, PathTranslation, SegmentName, ServiceInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathMatcherRule {
    pub operation: String,
    pub pattern: HttpPattern,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extract_path_parameters: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub rules: Vec<PathMatcherRule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segment_names: Vec<SegmentName>,
}

/// Build the path matcher config, or `None` when no operation is reachable.
pub fn build(info: &ServiceInfo, opts: &GeneratorOptions) -> Option<FilterConfig> {
    let mut rules = Vec::new();
    for (operation, method) in info.iter_methods() {
        if opts.backend.protocol == BackendProtocol::Grpc {
            rules.push(PathMatcherRule {
                operation: operation.to_string(),
                pattern: HttpPattern {
                    http_method: "POST".to_string(),
                    uri_template: format!("/{}/{}", method.api_name, method.short_name),
                },
                extract_path_parameters: false,
            });
        }

        let constant_address =
            method.backend_rule.translation == PathTranslation::ConstantAddress;
        for pattern in &method.http_rules {
            if pattern.uri_template.is_empty() || pattern.http_method.is_empty() {
                continue;
            }
            rules.push(PathMatcherRule {
                operation: operation.to_string(),
                pattern: pattern.clone(),
                extract_path_parameters: constant_address
                    && has_path_parameter(&pattern.uri_template),
            });
        }
    }

    if rules.is_empty() {
        return None;
    }

    rules.sort_by(|a, b| {
        a.operation
            .cmp(&b.operation)
            .then_with(|| a.pattern.uri_template.cmp(&b.pattern.uri_template))
    });

    let segment_names = if rules.iter().any(|r| r.extract_path_parameters) {
        info.segment_names.clone()
    } else {
        Vec::new()
    };

    Some(FilterConfig {
        rules,
        segment_names,
    })
}

fn has_path_parameter(template: &str) -> bool {
    template.contains('{')
}
