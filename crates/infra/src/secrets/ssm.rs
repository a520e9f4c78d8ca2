use async_trait::async_trait;
use sentinel_core::{CredentialsLocation, SecretBackend, SecretBackendError};
use sentinel_domain::{AwsConfig, SecureString, SentinelError};
use serde_json::json;
use tracing::debug;

use super::{config_error, lookup_error};
use crate::aws::{AwsCredentials, AwsJsonClient};
use crate::http::HttpClient;

/// `AWS_SSM`: locators are SecureString parameter names, read with
/// decryption.
#[derive(Debug, Clone)]
pub struct SsmParameterBackend {
    client: AwsJsonClient,
}

impl SsmParameterBackend {
    /// # Errors
    /// `SentinelError::Config` if `aws.endpoint_url` is not a valid URL.
    pub fn new(http: HttpClient, aws: &AwsConfig) -> Result<Self, SentinelError> {
        let client =
            AwsJsonClient::new(http, "ssm", "AmazonSSM", &aws.region, aws.endpoint_url.as_deref())
                .map_err(config_error)?;
        Ok(Self { client })
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.client = self.client.with_credentials(credentials);
        self
    }
}

#[async_trait]
impl SecretBackend for SsmParameterBackend {
    fn location(&self) -> CredentialsLocation {
        CredentialsLocation::AwsSsm
    }

    async fn fetch(&self, locator: &str) -> Result<SecureString, SecretBackendError> {
        debug!(parameter = locator, "reading SSM parameter");
        let response = self
            .client
            .call("GetParameter", &json!({ "Name": locator, "WithDecryption": true }))
            .await
            .map_err(|err| lookup_error(locator, err, &["ParameterNotFound", "ParameterVersionNotFound"]))?;

        let value = response
            .pointer("/Parameter/Value")
            .ok_or_else(|| SecretBackendError::Malformed("GetParameter response has no Parameter.Value".into()))?
            .as_str()
            .ok_or_else(|| SecretBackendError::Malformed("Parameter.Value is not a string".into()))?;

        Ok(SecureString::new(value))
    }
}
