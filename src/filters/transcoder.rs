//! gRPC/JSON transcoder filter.

use serde::Serialize;

use crate::service::{FileType, ServiceInfo};

/// API-key style parameters stripped before the request reaches the backend.
const IGNORED_QUERY_PARAMETERS: [&str; 3] = ["api_key", "key", "access_token"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    #[serde(with = "crate::service::base64_bytes")]
    pub proto_descriptor_bin: Vec<u8>,
    pub services: Vec<String>,
    pub ignored_query_parameters: Vec<String>,
    pub convert_grpc_status: bool,
}

/// Build the transcoder config from the first descriptor set among the
/// service's source files.
pub fn build(info: &ServiceInfo) -> Option<FilterConfig> {
    let descriptor = info
        .service_config()
        .source_info
        .source_files
        .iter()
        .find(|f| f.file_type == FileType::FileDescriptorSetProto)?;

    tracing::debug!(
        file_path = %descriptor.file_path,
        bytes = descriptor.file_contents.len(),
        "using proto descriptor"
    );

    Some(FilterConfig {
        proto_descriptor_bin: descriptor.file_contents.clone(),
        services: vec![info.api_name.clone()],
        ignored_query_parameters: IGNORED_QUERY_PARAMETERS
            .iter()
            .map(|p| p.to_string())
            .collect(),
        convert_grpc_status: true,
    })
}
