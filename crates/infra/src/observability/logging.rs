//! Logging initialisation
//!
//! `RUST_LOG` wins over the configured level so a single run can be made
//! verbose without editing the config file.

use sentinel_domain::{LogFormat, LoggingConfig, SentinelError};
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber described by `config`.
///
/// Calling it again once a subscriber is installed is a no-op.
///
/// # Errors
/// `SentinelError::Config` if `config.level` is not a valid filter directive.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SentinelError> {
    let filter = build_filter(config)?;

    let installed = match config.format {
        LogFormat::Json => fmt().json().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(false).try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(level = %config.level, format = ?config.format, "logging initialised");
    }
    Ok(())
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, SentinelError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|err| {
        SentinelError::Config(format!("invalid logging.level '{}': {err}", config.level))
    })
}
