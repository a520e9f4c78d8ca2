//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Use the explicit path, or `SENTINEL_CONFIG`, or search standard paths
//! 2. Parse by extension (`.toml` or `.json`)
//! 3. Apply environment overrides
//! 4. Validate, including the credentials location
//!
//! ## Environment Overrides
//! - `SENTINEL_CREDENTIALS_LOCATION`: replaces `global.credentials_location`
//! - `SENTINEL_MAX_CONCURRENT_TARGETS`: replaces `audit.max_concurrent_targets`
//! - `SENTINEL_DEADLINE_SECS`: replaces `audit.deadline_secs`
//!
//! ## File Locations
//! When no path is given the loader searches, in order:
//! 1. the file named by `SENTINEL_CONFIG`
//! 2. `./sentinel.toml`, `./sentinel.json`
//! 3. the same names one and two directories up
//! 4. the same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sentinel_core::CredentialsLocation;
use sentinel_domain::constants::{
    CONFIG_FILE_NAMES, CONFIG_PATH_ENV, ENV_CREDENTIALS_LOCATION, ENV_DEADLINE_SECS,
    ENV_MAX_CONCURRENT_TARGETS,
};
use sentinel_domain::{Result, SentinelConfig, SentinelError};
use tracing::{debug, info};

use crate::errors::InfraError;

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format implied by the file extension.
    ///
    /// # Errors
    /// `SentinelError::Config` for anything but `.toml` and `.json`.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            other => Err(SentinelError::Config(format!(
                "Unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }
}

/// Load, override and validate the configuration.
///
/// # Errors
/// Returns `SentinelError::Config` if no file is found, the file is invalid,
/// an override cannot be parsed, or validation fails.
pub fn load() -> Result<SentinelConfig> {
    let mut config = load_from_file(None)?;
    apply_env_overrides(&mut config)?;
    validate(&config)?;
    Ok(config)
}

/// Parse a configuration file.
///
/// If `path` is `None`, the standard locations are searched with
/// [`search_config_paths`]. Overrides are not applied.
///
/// # Errors
/// Returns `SentinelError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<SentinelConfig> {
    let config_path = match path {
        Some(p) if !p.exists() => {
            return Err(SentinelError::Config(format!("Config file not found: {}", p.display())));
        }
        Some(p) => p,
        None => search_config_paths().ok_or_else(|| {
            SentinelError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    info!(path = %config_path.display(), "loading configuration");

    let format = ConfigFormat::from_path(&config_path)?;
    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SentinelError::Config(format!("Failed to read config file: {e}")))?;

    load_from_str(&contents, format)
}

/// Parse configuration from a string.
///
/// # Errors
/// Returns `SentinelError::Config` if parsing fails.
pub fn load_from_str(contents: &str, format: ConfigFormat) -> Result<SentinelConfig> {
    let parsed = match format {
        ConfigFormat::Toml => toml::from_str(contents).map_err(InfraError::from),
        ConfigFormat::Json => serde_json::from_str(contents).map_err(InfraError::from),
    };
    Ok(parsed?)
}

/// Apply `SENTINEL_*` environment overrides to `config`.
///
/// # Errors
/// Returns `SentinelError::Config` if a numeric override does not parse.
pub fn apply_env_overrides(config: &mut SentinelConfig) -> Result<()> {
    if let Some(location) = env_var(ENV_CREDENTIALS_LOCATION) {
        debug!(variable = ENV_CREDENTIALS_LOCATION, "overriding credentials location");
        config.global.credentials_location = location;
    }
    if let Some(value) = env_var(ENV_MAX_CONCURRENT_TARGETS) {
        config.audit.max_concurrent_targets = parse_env(ENV_MAX_CONCURRENT_TARGETS, &value)?;
    }
    if let Some(value) = env_var(ENV_DEADLINE_SECS) {
        config.audit.deadline_secs = Some(parse_env(ENV_DEADLINE_SECS, &value)?);
    }
    Ok(())
}

/// Domain validation plus the credentials location check.
fn validate(config: &SentinelConfig) -> Result<()> {
    config.validate()?;
    CredentialsLocation::from_str(&config.global.credentials_location)?;
    Ok(())
}

/// Search the standard locations for a configuration file.
///
/// # Returns
/// The first existing candidate, or `None`.
pub fn search_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(explicit) = env_var(CONFIG_PATH_ENV) {
        candidates.push(PathBuf::from(explicit));
    }

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        candidates.extend(CONFIG_FILE_NAMES.iter().map(|name| exe_dir.join(name)));
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    [dir.to_path_buf(), dir.join(".."), dir.join("../..")]
        .iter()
        .flat_map(|base| CONFIG_FILE_NAMES.iter().map(move |name| base.join(name)))
        .collect()
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SentinelError::Config(format!("Invalid value for {key} ('{value}'): {e}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use sentinel_domain::LogFormat;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const SAMPLE: &str = r#"
[global]
credentials_location = "CONFIG_FILE"
shodan_api_key_value = ""

[audit]
accounts = ["111111111111"]
regions = ["us-east-1"]
"#;

    fn clear_overrides() {
        std::env::remove_var(ENV_CREDENTIALS_LOCATION);
        std::env::remove_var(ENV_MAX_CONCURRENT_TARGETS);
        std::env::remove_var(ENV_DEADLINE_SECS);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a/sentinel.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("sentinel.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("sentinel.yaml")).is_err());
        assert!(ConfigFormat::from_path(Path::new("sentinel")).is_err());
    }

    #[test]
    fn test_load_from_str_toml_defaults() {
        let config = load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        assert_eq!(config.global.credentials_location, "CONFIG_FILE");
        assert_eq!(config.global.locator("shodan_api_key"), Some(""));
        assert_eq!(config.audit.max_concurrent_targets, 4);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_global_is_config_error() {
        let err = load_from_str("[audit]\nregions = [\"us-east-1\"]\n", ConfigFormat::Toml).unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }

    #[test]
    fn test_env_overrides_apply() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();
        std::env::set_var(ENV_CREDENTIALS_LOCATION, "AWS_SSM");
        std::env::set_var(ENV_MAX_CONCURRENT_TARGETS, "16");
        std::env::set_var(ENV_DEADLINE_SECS, "600");

        let mut config = load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.global.credentials_location, "AWS_SSM");
        assert_eq!(config.audit.max_concurrent_targets, 16);
        assert_eq!(config.audit.deadline_secs, Some(600));
        clear_overrides();
    }

    #[test]
    fn test_invalid_numeric_override_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_overrides();
        std::env::set_var(ENV_MAX_CONCURRENT_TARGETS, "many");

        let mut config = load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        let err = apply_env_overrides(&mut config).unwrap_err();

        assert!(matches!(err, SentinelError::Config(msg) if msg.contains(ENV_MAX_CONCURRENT_TARGETS)));
        clear_overrides();
    }

    #[test]
    fn test_validate_rejects_unknown_location() {
        let mut config = load_from_str(SAMPLE, ConfigFormat::Toml).unwrap();
        config.global.credentials_location = "VAULT".into();
        assert!(matches!(validate(&config), Err(SentinelError::Config(_))));
    }

    #[test]
    fn test_candidates_cover_parent_directories() {
        let candidates = candidates_in(Path::new("/work/project"));
        assert_eq!(candidates.len(), 3 * CONFIG_FILE_NAMES.len());
        assert_eq!(candidates[0], PathBuf::from("/work/project/sentinel.toml"));
    }
}
