//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use sentinel_domain::SentinelError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SentinelError);

impl From<InfraError> for SentinelError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SentinelError> for InfraError {
    fn from(value: SentinelError) -> Self {
        InfraError(value)
    }
}

trait IntoSentinelError {
    fn into_sentinel(self) -> SentinelError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SentinelError */
/* -------------------------------------------------------------------------- */

impl IntoSentinelError for HttpError {
    fn into_sentinel(self) -> SentinelError {
        if self.is_timeout() {
            return SentinelError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return SentinelError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                401 | 403 => SentinelError::Credential(message),
                404 => SentinelError::NotFound(message),
                400..=499 if code != 429 => SentinelError::InvalidInput(message),
                _ => SentinelError::Network(message),
            };
        }

        if self.is_builder() {
            return SentinelError::InvalidInput(format!("invalid HTTP request: {self}"));
        }

        SentinelError::Network(format!("HTTP error: {self}"))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_sentinel())
    }
}

/* -------------------------------------------------------------------------- */
/* Config parsing errors → SentinelError::Config */
/* -------------------------------------------------------------------------- */

impl IntoSentinelError for toml::de::Error {
    fn into_sentinel(self) -> SentinelError {
        SentinelError::Config(format!("Invalid TOML format: {}", self.message()))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(value.into_sentinel())
    }
}

impl IntoSentinelError for serde_json::Error {
    fn into_sentinel(self) -> SentinelError {
        use serde_json::error::Category;

        match self.classify() {
            Category::Io => SentinelError::Internal(format!("JSON I/O failure: {self}")),
            Category::Syntax | Category::Data | Category::Eof => {
                SentinelError::Config(format!("Invalid JSON format: {self}"))
            }
        }
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(value.into_sentinel())
    }
}

impl From<url::ParseError> for InfraError {
    fn from(value: url::ParseError) -> Self {
        InfraError(SentinelError::Config(format!("invalid endpoint URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
