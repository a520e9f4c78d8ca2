//! Secret backends behind the `SecretBackend` port.
//!
//! | `credentials_location` | Backend | Locator |
//! |---|---|---|
//! | `CONFIG_FILE` | [`ConfigFileBackend`] | the secret itself |
//! | `AWS_SSM` | [`SsmParameterBackend`] | SecureString parameter name |
//! | `AWS_SECRETS_MANAGER` | [`SecretsManagerBackend`] | secret id or ARN |

mod config_file;
mod secrets_manager;
mod ssm;

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::{CredentialsLocation, SecretBackend, SecretBackendError};
use sentinel_common::CommonError;
use sentinel_domain::{AwsConfig, SentinelError};

pub use config_file::ConfigFileBackend;
pub use secrets_manager::SecretsManagerBackend;
pub use ssm::SsmParameterBackend;

use crate::aws::AwsServiceError;
use crate::http::HttpClient;

/// Build the backend serving `location`.
///
/// # Errors
/// `SentinelError::Config` if the AWS endpoint is invalid or the HTTP client
/// cannot be built.
pub fn backend_for(
    location: CredentialsLocation,
    aws: &AwsConfig,
) -> Result<Arc<dyn SecretBackend>, SentinelError> {
    let backend: Arc<dyn SecretBackend> = match location {
        CredentialsLocation::ConfigFile => Arc::new(ConfigFileBackend),
        CredentialsLocation::AwsSsm => Arc::new(SsmParameterBackend::new(aws_http(aws)?, aws)?),
        CredentialsLocation::AwsSecretsManager => {
            Arc::new(SecretsManagerBackend::new(aws_http(aws)?, aws)?)
        }
    };
    Ok(backend)
}

fn aws_http(aws: &AwsConfig) -> Result<HttpClient, SentinelError> {
    HttpClient::builder().timeout(Duration::from_secs(aws.request_timeout_secs.max(1))).build()
}

fn config_error(err: CommonError) -> SentinelError {
    SentinelError::Config(err.to_string())
}

/// Map a failed AWS call for `locator` onto the backend error taxonomy.
/// `not_found_codes` are the service's codes for a missing secret.
fn lookup_error(locator: &str, err: AwsServiceError, not_found_codes: &[&str]) -> SecretBackendError {
    match (err.code(), err.status()) {
        (Some(code), _) if not_found_codes.contains(&code) => {
            SecretBackendError::NotFound { locator: locator.to_string() }
        }
        (Some("AccessDeniedException" | "UnrecognizedClientException"), _)
        | (Some(_), Some(401 | 403)) => {
            SecretBackendError::AccessDenied { locator: locator.to_string(), message: err.to_string() }
        }
        (Some("ThrottlingException"), _) | (Some(_), Some(429)) => {
            SecretBackendError::Common(CommonError::rate_limited(locator, None))
        }
        _ => match err {
            AwsServiceError::Transport(common) => SecretBackendError::Common(common),
            other => SecretBackendError::Request(other.to_string()),
        },
    }
}
