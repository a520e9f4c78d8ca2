use async_trait::async_trait;
use sentinel_core::{CredentialsLocation, SecretBackend, SecretBackendError};
use sentinel_domain::SecureString;

/// `CONFIG_FILE`: the configured value is the secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigFileBackend;

#[async_trait]
impl SecretBackend for ConfigFileBackend {
    fn location(&self) -> CredentialsLocation {
        CredentialsLocation::ConfigFile
    }

    async fn fetch(&self, locator: &str) -> Result<SecureString, SecretBackendError> {
        Ok(SecureString::new(locator))
    }
}
