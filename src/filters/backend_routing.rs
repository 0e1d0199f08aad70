//! Backend routing filter.

use serde::Serialize;

use crate::service::{PathTranslation, ServiceInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub rules: Vec<BackendRoutingRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendRoutingRule {
    pub operation: String,
    pub is_const_address: bool,
    pub path_prefix: String,
}

/// One rule per operation that rewrites its path. Always produced.
pub fn build(info: &ServiceInfo) -> FilterConfig {
    let rules = info
        .iter_methods()
        .filter_map(|(operation, method)| {
            let rule = &method.backend_rule;
            let is_const_address = match rule.translation {
                PathTranslation::PathTranslationUnspecified => return None,
                PathTranslation::ConstantAddress => true,
                PathTranslation::AppendPathToAddress => false,
            };
            Some(BackendRoutingRule {
                operation: operation.to_string(),
                is_const_address,
                path_prefix: rule.address.clone(),
            })
        })
        .collect();

    FilterConfig { rules }
}
