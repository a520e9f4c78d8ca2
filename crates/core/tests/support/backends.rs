use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sentinel_core::{CredentialsLocation, SecretBackend, SecretBackendError};
use sentinel_domain::SecureString;

/// CONFIG_FILE backend: the locator is the secret.
pub fn literal() -> Arc<ScriptedBackend> {
    Arc::new(ScriptedBackend::new(CredentialsLocation::ConfigFile))
}

/// Backend answering from a fixed table and counting lookups.
pub struct ScriptedBackend {
    location: CredentialsLocation,
    table: HashMap<String, String>,
    deny_all: bool,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(location: CredentialsLocation) -> Self {
        Self { location, table: HashMap::new(), deny_all: false, calls: AtomicUsize::new(0) }
    }

    /// Serve `value` for `locator`.
    pub fn with_secret(mut self, locator: &str, value: &str) -> Self {
        self.table.insert(locator.to_string(), value.to_string());
        self
    }

    /// Fail every lookup with access denied.
    pub fn denying(mut self) -> Self {
        self.deny_all = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretBackend for ScriptedBackend {
    fn location(&self) -> CredentialsLocation {
        self.location
    }

    async fn fetch(&self, locator: &str) -> Result<SecureString, SecretBackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny_all {
            return Err(SecretBackendError::AccessDenied {
                locator: locator.to_string(),
                message: "not authorized to perform ssm:GetParameter".to_string(),
            });
        }
        match self.location {
            CredentialsLocation::ConfigFile => Ok(SecureString::new(locator)),
            _ => self
                .table
                .get(locator)
                .map(|value| SecureString::new(value.as_str()))
                .ok_or_else(|| SecretBackendError::NotFound { locator: locator.to_string() }),
        }
    }
}
