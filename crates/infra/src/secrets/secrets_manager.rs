use async_trait::async_trait;
use sentinel_core::{CredentialsLocation, SecretBackend, SecretBackendError};
use sentinel_domain::{AwsConfig, SecureString, SentinelError};
use serde_json::json;
use tracing::debug;

use super::{config_error, lookup_error};
use crate::aws::{AwsCredentials, AwsJsonClient};
use crate::http::HttpClient;

/// `AWS_SECRETS_MANAGER`: locators are secret ids or ARNs. Only
/// `SecretString` values are supported.
#[derive(Debug, Clone)]
pub struct SecretsManagerBackend {
    client: AwsJsonClient,
}

impl SecretsManagerBackend {
    /// # Errors
    /// `SentinelError::Config` if `aws.endpoint_url` is not a valid URL.
    pub fn new(http: HttpClient, aws: &AwsConfig) -> Result<Self, SentinelError> {
        let client = AwsJsonClient::new(
            http,
            "secretsmanager",
            "secretsmanager",
            &aws.region,
            aws.endpoint_url.as_deref(),
        )
        .map_err(config_error)?;
        Ok(Self { client })
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.client = self.client.with_credentials(credentials);
        self
    }
}

#[async_trait]
impl SecretBackend for SecretsManagerBackend {
    fn location(&self) -> CredentialsLocation {
        CredentialsLocation::AwsSecretsManager
    }

    async fn fetch(&self, locator: &str) -> Result<SecureString, SecretBackendError> {
        debug!(secret_id = locator, "reading Secrets Manager secret");
        let response = self
            .client
            .call("GetSecretValue", &json!({ "SecretId": locator }))
            .await
            .map_err(|err| lookup_error(locator, err, &["ResourceNotFoundException"]))?;

        match response.get("SecretString") {
            Some(value) => value
                .as_str()
                .map(SecureString::new)
                .ok_or_else(|| SecretBackendError::Malformed("SecretString is not a string".into())),
            None => Err(SecretBackendError::EmptySecret { locator: locator.to_string() }),
        }
    }
}
