//! Integration tests for the shared error taxonomy
//!
//! Verifies that module errors composing `CommonError` keep its
//! classification.

#![cfg(feature = "foundation")]

use std::time::Duration;

use sentinel_common::{CommonError, ErrorClassification, ErrorSeverity};
use thiserror::Error;

#[derive(Debug, Error)]
enum BrokerCheckError {
    #[error("broker listing truncated: {0}")]
    Truncated(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ErrorClassification for BrokerCheckError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Truncated(_) => false,
            Self::Common(e) => e.is_retryable(),
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Truncated(_) => ErrorSeverity::Error,
            Self::Common(e) => e.severity(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Common(e) => e.retry_after(),
            Self::Truncated(_) => None,
        }
    }
}

#[test]
fn test_composed_error_delegates_classification() {
    let throttled: BrokerCheckError =
        CommonError::rate_limited("mq", Some(Duration::from_millis(250))).into();

    assert!(throttled.is_retryable());
    assert_eq!(throttled.severity(), ErrorSeverity::Warning);
    assert_eq!(throttled.retry_after(), Some(Duration::from_millis(250)));
    assert!(!throttled.is_critical());
}

#[test]
fn test_module_variant_keeps_its_own_classification() {
    let truncated = BrokerCheckError::Truncated("page token expired".into());

    assert!(!truncated.is_retryable());
    assert_eq!(truncated.severity(), ErrorSeverity::Error);
    assert_eq!(truncated.to_string(), "broker listing truncated: page token expired");
}

#[test]
fn test_transparent_display_uses_common_message() {
    let err: BrokerCheckError = CommonError::backend("mq", "connection reset", true).into();
    assert_eq!(err.to_string(), "'mq' call failed: connection reset");
    assert!(err.is_retryable());
}

#[test]
fn test_internal_errors_are_critical_through_composition() {
    let err: BrokerCheckError = CommonError::internal("cursor regressed").into();
    assert!(err.is_critical());
    assert_eq!(err.retry_after(), None);
}
