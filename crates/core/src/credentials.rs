//! Credential resolution
//!
//! The `[global]` config table names one backend for every secret
//! (`credentials_location`) and one locator per secret (`<name>_value`).
//! [`CredentialResolver`] turns a secret name into a [`Credential`] through
//! the configured [`SecretBackend`]. Resolution never fails the run: a
//! missing locator or a backend error yields an unavailable credential and
//! the checks that depend on it skip their enrichment path.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sentinel_common::cache::RunCache;
use sentinel_common::CommonError;
use sentinel_domain::{GlobalCredentialsConfig, SecureString, SentinelError};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Where secrets are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CredentialsLocation {
    /// The `<name>_value` entry is the secret itself.
    #[serde(rename = "CONFIG_FILE")]
    ConfigFile,
    /// The entry names an SSM Parameter Store parameter.
    #[serde(rename = "AWS_SSM")]
    AwsSsm,
    /// The entry names a Secrets Manager secret.
    #[serde(rename = "AWS_SECRETS_MANAGER")]
    AwsSecretsManager,
}

impl CredentialsLocation {
    pub const ALL: [Self; 3] = [Self::ConfigFile, Self::AwsSsm, Self::AwsSecretsManager];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigFile => "CONFIG_FILE",
            Self::AwsSsm => "AWS_SSM",
            Self::AwsSecretsManager => "AWS_SECRETS_MANAGER",
        }
    }
}

impl fmt::Display for CredentialsLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialsLocation {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|location| location.as_str() == s.trim()).ok_or_else(|| {
            SentinelError::Config(format!(
                "invalid credentials_location '{s}', expected one of CONFIG_FILE, AWS_SSM, AWS_SECRETS_MANAGER"
            ))
        })
    }
}

/// Errors a secret backend reports for one lookup.
#[derive(Debug, Error)]
pub enum SecretBackendError {
    #[error("access denied to '{locator}': {message}")]
    AccessDenied { locator: String, message: String },

    #[error("secret '{locator}' not found")]
    NotFound { locator: String },

    #[error("secret '{locator}' has no string value")]
    EmptySecret { locator: String },

    #[error("backend request failed: {0}")]
    Request(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl From<SecretBackendError> for SentinelError {
    fn from(err: SecretBackendError) -> Self {
        SentinelError::Credential(err.to_string())
    }
}

/// Port for reading one secret from a backend.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// The location this backend serves.
    fn location(&self) -> CredentialsLocation;

    /// Read the secret identified by `locator`.
    async fn fetch(&self, locator: &str) -> Result<SecureString, SecretBackendError>;
}

/// Why a credential could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// No `<name>_value` entry in `[global]`.
    NotConfigured,
    /// The entry or the fetched value is empty.
    Empty,
    /// The backend failed; the message never contains the secret.
    Backend(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not configured"),
            Self::Empty => write!(f, "empty value"),
            Self::Backend(cause) => write!(f, "backend error: {cause}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValue {
    Available(SecureString),
    Unavailable(UnavailableReason),
}

/// A resolved secret. `Debug` never prints the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub name: String,
    pub location: CredentialsLocation,
    pub value: CredentialValue,
}

impl Credential {
    pub fn is_available(&self) -> bool {
        matches!(self.value, CredentialValue::Available(_))
    }

    pub fn value(&self) -> Option<&SecureString> {
        match &self.value {
            CredentialValue::Available(secret) => Some(secret),
            CredentialValue::Unavailable(_) => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&UnavailableReason> {
        match &self.value {
            CredentialValue::Available(_) => None,
            CredentialValue::Unavailable(reason) => Some(reason),
        }
    }
}

/// Immutable set of credentials resolved once per run.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCredentials {
    credentials: BTreeMap<String, Credential>,
}

impl ResolvedCredentials {
    pub fn get(&self, name: &str) -> Option<&Credential> {
        self.credentials.get(name)
    }

    /// Value of `name` when it resolved.
    pub fn value(&self, name: &str) -> Option<&SecureString> {
        self.get(name).and_then(Credential::value)
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_some_and(Credential::is_available)
    }

    /// Names of credentials that did not resolve.
    pub fn unavailable(&self) -> impl Iterator<Item = &str> {
        self.credentials.values().filter(|c| !c.is_available()).map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

impl FromIterator<Credential> for ResolvedCredentials {
    fn from_iter<I: IntoIterator<Item = Credential>>(iter: I) -> Self {
        Self { credentials: iter.into_iter().map(|c| (c.name.clone(), c)).collect() }
    }
}

/// Resolves secrets through the configured backend, once per name.
pub struct CredentialResolver {
    location: CredentialsLocation,
    locators: BTreeMap<String, String>,
    backend: Arc<dyn SecretBackend>,
    resolved: RunCache,
}

impl CredentialResolver {
    /// Create a resolver for `config` backed by `backend`.
    ///
    /// # Errors
    /// [`SentinelError::Config`] when `credentials_location` is not a known
    /// location or does not match the backend.
    pub fn new(
        config: &GlobalCredentialsConfig,
        backend: Arc<dyn SecretBackend>,
    ) -> Result<Self, SentinelError> {
        let location: CredentialsLocation = config.credentials_location.parse()?;
        if backend.location() != location {
            return Err(SentinelError::Config(format!(
                "credentials_location is {location} but the backend serves {}",
                backend.location()
            )));
        }

        let locators = config
            .secret_names()
            .filter_map(|name| config.locator(name).map(|locator| (name.to_string(), locator.to_string())))
            .collect();

        Ok(Self { location, locators, backend, resolved: RunCache::new("credentials") })
    }

    pub fn location(&self) -> CredentialsLocation {
        self.location
    }

    /// Resolve `name`. Concurrent and repeated calls share one backend
    /// lookup.
    pub async fn resolve(&self, name: &str) -> Credential {
        let resolved = self
            .resolved
            .get_or_compute(name, || async { Ok::<_, Infallible>(self.lookup(name).await) })
            .await;

        match resolved {
            Ok(credential) => Credential::clone(&credential),
            Err(err) => self.unavailable(name, UnavailableReason::Backend(err.to_string())),
        }
    }

    /// Resolve every name in `names`.
    pub async fn resolve_all<I, S>(&self, names: I) -> ResolvedCredentials
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut credentials = Vec::new();
        for name in names {
            credentials.push(self.resolve(name.as_ref()).await);
        }
        credentials.into_iter().collect()
    }

    async fn lookup(&self, name: &str) -> Credential {
        let Some(locator) = self.locators.get(name).map(|l| l.trim()) else {
            debug!(credential = %name, "no locator configured");
            return self.unavailable(name, UnavailableReason::NotConfigured);
        };
        if locator.is_empty() {
            warn!(credential = %name, location = %self.location, "credential value is empty");
            return self.unavailable(name, UnavailableReason::Empty);
        }

        match self.backend.fetch(locator).await {
            Ok(secret) if secret.is_blank() => {
                warn!(credential = %name, location = %self.location, "backend returned an empty secret");
                self.unavailable(name, UnavailableReason::Empty)
            }
            Ok(secret) => {
                debug!(credential = %name, location = %self.location, "credential resolved");
                Credential {
                    name: name.to_string(),
                    location: self.location,
                    value: CredentialValue::Available(secret),
                }
            }
            Err(err) => {
                warn!(
                    credential = %name,
                    location = %self.location,
                    error = %err,
                    "credential unavailable"
                );
                self.unavailable(name, UnavailableReason::Backend(err.to_string()))
            }
        }
    }

    fn unavailable(&self, name: &str, reason: UnavailableReason) -> Credential {
        Credential {
            name: name.to_string(),
            location: self.location,
            value: CredentialValue::Unavailable(reason),
        }
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("location", &self.location)
            .field("secrets", &self.locators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
