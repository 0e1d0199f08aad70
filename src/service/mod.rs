//! Service description subsystem.
//!
//! # Data Flow
//! ```text
//! service config (JSON)
//!     → model.rs (deserialize the consumed sections)
//!     → info.rs (resolve selectors, synthesize CORS operations,
//!                collect segment names)
//!     → ServiceInfo (read-only policy model for one compilation pass)
//! ```
//!
//! # Design Decisions
//! - ServiceInfo is built once per pass and never mutated afterwards
//! - Operation order follows the declaration order of the config
//! - Unknown sections and fields are ignored, not rejected

pub mod info;
pub mod model;

pub use info::{
    ApiKeyLocation, BackendRule, HttpPattern, MethodInfo, MetricCost, SegmentName, ServiceError,
    ServiceInfo,
};
pub use model::{FileType, PathTranslation, ServiceConfig};

/// Serde adapter for `bytes` fields, rendered as standard base64 like the
/// JSON mapping of protobuf `bytes`.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
