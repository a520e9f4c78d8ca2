//! # Sentinel Infrastructure
//!
//! Infrastructure implementations of core engine ports.
//!
//! This crate contains:
//! - Configuration loading (TOML/JSON files plus environment overrides)
//! - Logging initialisation
//! - The retrying HTTP client and AWS JSON-protocol plumbing (SigV4)
//! - Secret backends for `CONFIG_FILE`, `AWS_SSM` and `AWS_SECRETS_MANAGER`
//! - The endpoint catalog answering service availability per partition
//!
//! ## Architecture
//! - Implements traits defined in `sentinel-core`
//! - Depends on `sentinel-domain` and `sentinel-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod availability;
pub mod aws;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;
pub mod secrets;

// Re-export commonly used items
pub use availability::EndpointCatalog;
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_logging;
pub use secrets::{backend_for, ConfigFileBackend, SecretsManagerBackend, SsmParameterBackend};
