//! Error taxonomy shared by provider calls and secret store lookups.
//!
//! [`CommonError`] covers the failures every adapter runs into (throttling,
//! backend outages, bad payloads, invalid settings). Module errors wrap it
//! with `#[from]` and delegate [`ErrorClassification`] to it:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum WidgetCheckError {
//!     #[error("widget listing was truncated: {0}")]
//!     Truncated(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```
//!
//! The orchestrator reads the classification of an isolated check failure
//! to pick its log level and to fill the run report.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failures shared by every adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// A setting is missing or malformed.
    #[error("invalid configuration for '{field}': {message}")]
    Config { field: String, message: String },

    /// A payload could not be encoded or decoded.
    #[error("{format} payload error: {message}")]
    Serialization { format: String, message: String },

    /// The provider throttled the caller.
    #[error("'{service}' throttled the request{}", retry_hint(.retry_after))]
    RateLimitExceeded { service: String, retry_after: Option<Duration> },

    /// The provider or secret store failed to answer usefully.
    #[error("'{service}' call failed: {message}")]
    Backend { service: String, message: String, is_retryable: bool },

    /// Broken invariant inside the engine.
    #[error("internal error: {message}")]
    Internal { message: String },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    retry_after.map(|delay| format!(" (retry in {}ms)", delay.as_millis())).unwrap_or_default()
}

impl CommonError {
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { field: field.into(), message: message.into() }
    }

    pub fn serialization_format(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization { format: format.into(), message: message.into() }
    }

    pub fn rate_limited(service: impl Into<String>, retry_after: Option<Duration>) -> Self {
        Self::RateLimitExceeded { service: service.into(), retry_after }
    }

    pub fn backend(service: impl Into<String>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            Self::Config { .. } | Self::Serialization { .. } | Self::Internal { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RateLimitExceeded { .. } => ErrorSeverity::Warning,
            Self::Config { .. } | Self::Serialization { .. } | Self::Backend { .. } => {
                ErrorSeverity::Error
            }
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimitExceeded { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Retryability and severity of an error.
pub trait ErrorClassification {
    /// Transient failures such as throttling or a backend hiccup.
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Delay the provider asked for, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// How loudly a failure should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        })
    }
}
