//! Backend authentication filter.
//!
//! # Responsibilities
//! - List the operations whose backend expects an identity token
//! - Pick where identity tokens come from, once for the whole listener
//!
//! # Token Sources
//! ```text
//! iam_service_account set:
//!     metadata server (access token) → identity broker (generateIdToken)
//! otherwise:
//!     metadata server (identity token)
//! ```

use serde::Serialize;

use crate::config::GeneratorOptions;
use crate::filters::{
    identity_token_uri, trim_base, AccessToken, HttpUri, IAM_CLUSTER, METADATA_CLUSTER,
};
use crate::service::ServiceInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub rules: Vec<BackendAuthRule>,
    #[serde(flatten)]
    pub id_token_info: IdTokenInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendAuthRule {
    pub operation: String,
    pub jwt_audience: String,
}

/// Where identity tokens for backends are minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdTokenInfo {
    IamToken(IamIdTokenInfo),
    ImdsToken(ImdsIdTokenInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IamIdTokenInfo {
    pub iam_uri: HttpUri,
    pub access_token: AccessToken,
    pub service_account_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImdsIdTokenInfo {
    pub imds_server_uri: HttpUri,
}

impl IdTokenInfo {
    /// Token source chosen solely by whether an IAM service account is set.
    pub fn from_options(opts: &GeneratorOptions) -> Self {
        let creds = &opts.credentials;
        if creds.iam_service_account.is_empty() {
            IdTokenInfo::ImdsToken(ImdsIdTokenInfo {
                imds_server_uri: HttpUri::new(identity_token_uri(opts), METADATA_CLUSTER),
            })
        } else {
            IdTokenInfo::IamToken(IamIdTokenInfo {
                iam_uri: HttpUri::new(
                    format!(
                        "{}/v1/projects/-/serviceAccounts/{}:generateIdToken",
                        trim_base(&creds.iam_url),
                        creds.iam_service_account
                    ),
                    IAM_CLUSTER,
                ),
                // Only the metadata server is supported here, never a key file.
                access_token: AccessToken::from_options(opts),
                service_account_email: creds.iam_service_account.clone(),
            })
        }
    }
}

/// Build the backend auth config. Always produced, even without rules.
pub fn build(info: &ServiceInfo, opts: &GeneratorOptions) -> FilterConfig {
    let rules = info
        .iter_methods()
        .filter(|(_, method)| !method.backend_rule.jwt_audience.is_empty())
        .map(|(operation, method)| BackendAuthRule {
            operation: operation.to_string(),
            jwt_audience: method.backend_rule.jwt_audience.clone(),
        })
        .collect();

    FilterConfig {
        rules,
        id_token_info: IdTokenInfo::from_options(opts),
    }
}
