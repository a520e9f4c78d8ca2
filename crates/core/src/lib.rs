//! # Sentinel Core
//!
//! Audit engine logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The check contract and the registry checks attach to
//! - Credential resolution over a pluggable secret backend port
//! - The finding normalizer enforcing the canonical schema
//! - The orchestrator driving a run across targets
//!
//! ## Architecture Principles
//! - Only depends on `sentinel-common` and `sentinel-domain`
//! - No HTTP, AWS or filesystem code
//! - All external collaborators via traits (`SecretBackend`, `FindingSink`,
//!   `ServiceAvailability`)

pub mod availability;
pub mod check;
pub mod credentials;
pub mod normalizer;
pub mod orchestrator;
pub mod registry;
pub mod sink;

// Re-export specific items to avoid ambiguity
pub use availability::{AlwaysAvailable, ServiceAvailability};
pub use check::{AuditCheck, CheckContext, CheckError, FindingStream};
pub use credentials::{
    Credential, CredentialResolver, CredentialValue, CredentialsLocation, ResolvedCredentials,
    SecretBackend, SecretBackendError,
};
pub use normalizer::{FindingNormalizer, NormalizationError};
pub use orchestrator::{AuditOrchestrator, OrchestratorConfig, RunReport};
pub use registry::{CheckDescriptor, CheckPlugin, CheckRegistry, CredentialNeed, RegistryError};
pub use sink::{FindingSink, MemorySink, SinkError};
