//! Configuration structures
//!
//! Parsed by the infra config loader from `sentinel.toml`. Validation that
//! needs engine types (the credential location enum) happens in core.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CREDENTIAL_VALUE_SUFFIX, DEFAULT_AWS_REGION, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_TARGETS,
};
use crate::errors::{Result, SentinelError};

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    pub global: GlobalCredentialsConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SentinelConfig {
    /// Check the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        if self.global.credentials_location.trim().is_empty() {
            return Err(SentinelError::Config("global.credentials_location must be set".into()));
        }
        self.audit.validate()
    }
}

/// The `[global]` table: where secrets live and one locator per secret.
///
/// Besides `credentials_location`, every key ending in `_value` names a
/// secret. Depending on the location the value is the secret itself, an SSM
/// parameter name or a Secrets Manager secret id.
#[derive(Clone, Default, Deserialize)]
pub struct GlobalCredentialsConfig {
    pub credentials_location: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, String>,
}

impl GlobalCredentialsConfig {
    pub fn new(credentials_location: impl Into<String>) -> Self {
        Self { credentials_location: credentials_location.into(), values: BTreeMap::new() }
    }

    /// Set the locator for secret `name` (stored as `<name>_value`).
    pub fn with_value(mut self, name: &str, locator: impl Into<String>) -> Self {
        self.values.insert(format!("{name}{CREDENTIAL_VALUE_SUFFIX}"), locator.into());
        self
    }

    /// Locator configured for secret `name`, if any.
    pub fn locator(&self, name: &str) -> Option<&str> {
        self.values.get(&format!("{name}{CREDENTIAL_VALUE_SUFFIX}")).map(String::as_str)
    }

    /// Names of all configured secrets.
    pub fn secret_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().filter_map(|key| key.strip_suffix(CREDENTIAL_VALUE_SUFFIX))
    }
}

// Literal CONFIG_FILE values are secrets, so only keys are printed.
impl fmt::Debug for GlobalCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalCredentialsConfig")
            .field("credentials_location", &self.credentials_location)
            .field("values", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The `[audit]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub accounts: Vec<String>,
    pub regions: Vec<String>,
    pub max_concurrent_targets: usize,
    pub deadline_secs: Option<u64>,
    /// Pause between accounts; accounts then run one after another.
    pub target_delay_ms: u64,
    pub only_check: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            accounts: Vec::new(),
            regions: Vec::new(),
            max_concurrent_targets: DEFAULT_MAX_CONCURRENT_TARGETS,
            deadline_secs: None,
            target_delay_ms: 0,
            only_check: None,
        }
    }
}

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_targets == 0 {
            return Err(SentinelError::Config("audit.max_concurrent_targets must be at least 1".into()));
        }
        if self.deadline_secs == Some(0) {
            return Err(SentinelError::Config("audit.deadline_secs must be positive".into()));
        }
        if let Some(name) = &self.only_check {
            if name.trim().is_empty() {
                return Err(SentinelError::Config("audit.only_check must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn target_delay(&self) -> Duration {
        Duration::from_millis(self.target_delay_ms)
    }
}

/// The `[aws]` table: how the secret backends reach AWS.
///
/// Signing credentials are not configured here. They come from the `AWS_*`
/// environment variables, else from the `AWS_PROFILE` (or `default`) profile
/// of the shared credentials file. Instance roles and SSO are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    /// Overrides the regional endpoint (local stacks, tests).
    pub endpoint_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self { region: DEFAULT_AWS_REGION.to_string(), endpoint_url: None, request_timeout_secs: 10 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// The `[logging]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), format: LogFormat::Pretty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [global]
        credentials_location = "CONFIG_FILE"
        shodan_api_key_value = "abc123"
        virustotal_api_key_value = ""

        [audit]
        accounts = ["111111111111"]
        regions = ["us-east-1", "eu-west-1"]
        deadline_secs = 900

        [logging]
        format = "json"
    "#;

    #[test]
    fn test_parses_global_values() {
        let config: SentinelConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.global.credentials_location, "CONFIG_FILE");
        assert_eq!(config.global.locator("shodan_api_key"), Some("abc123"));
        assert_eq!(config.global.locator("virustotal_api_key"), Some(""));
        assert_eq!(config.global.locator("missing"), None);

        let mut names: Vec<&str> = config.global.secret_names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["shodan_api_key", "virustotal_api_key"]);
    }

    #[test]
    fn test_defaults_fill_missing_tables() {
        let config: SentinelConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.audit.max_concurrent_targets, DEFAULT_MAX_CONCURRENT_TARGETS);
        assert_eq!(config.audit.deadline(), Some(Duration::from_secs(900)));
        assert_eq!(config.audit.target_delay(), Duration::ZERO);
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_global_table_fails_to_parse() {
        assert!(toml::from_str::<SentinelConfig>("[audit]\nregions = []\n").is_err());
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let audit = AuditConfig { max_concurrent_targets: 0, ..AuditConfig::default() };
        assert!(matches!(audit.validate(), Err(SentinelError::Config(_))));
    }

    #[test]
    fn test_debug_hides_literal_secrets() {
        let global = GlobalCredentialsConfig::new("CONFIG_FILE").with_value("shodan_api_key", "abc123");
        let rendered = format!("{global:?}");
        assert!(rendered.contains("shodan_api_key_value"));
        assert!(!rendered.contains("abc123"));
    }
}
