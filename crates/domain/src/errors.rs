//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Sentinel
///
/// Only `Config` and `Registration` ever abort a run; every other variant is
/// recovered at the boundary where it occurs and recorded in the run report.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Check error: {0}")]
    Check(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Whether this error must stop a run before any check executes.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Registration(_))
    }
}

/// Result type alias for Sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;
