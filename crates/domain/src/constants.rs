//! Engine constants
//!
//! Centralized location for defaults and naming conventions shared by the
//! config loader, the resolver and the normalizer.

// Configuration defaults
pub const DEFAULT_MAX_CONCURRENT_TARGETS: usize = 4;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

// Credential locator keys are `<name>` + this suffix in `[global]`
pub const CREDENTIAL_VALUE_SUFFIX: &str = "_value";

// Finding ids are `<resource-id>` + separator + `<check-slug>`
pub const FINDING_ID_SEPARATOR: char = '/';

// Config file probing
pub const CONFIG_FILE_NAMES: &[&str] = &["sentinel.toml", "sentinel.json"];
pub const CONFIG_PATH_ENV: &str = "SENTINEL_CONFIG";

// Environment overrides
pub const ENV_CREDENTIALS_LOCATION: &str = "SENTINEL_CREDENTIALS_LOCATION";
pub const ENV_MAX_CONCURRENT_TARGETS: &str = "SENTINEL_MAX_CONCURRENT_TARGETS";
pub const ENV_DEADLINE_SECS: &str = "SENTINEL_DEADLINE_SECS";
