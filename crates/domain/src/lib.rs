//! # Sentinel Domain
//!
//! Domain types shared by every layer of the audit engine.
//!
//! This crate contains:
//! - Audit target context (`RunContext`, `Partition`, `TargetPlan`)
//! - Canonical finding schema and its lifecycle states
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Sentinel crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod finding;
pub mod macros;
pub mod secret;

// Re-export commonly used items
pub use config::*;
pub use context::{ContextExtras, Partition, ProviderKind, RunContext, TargetPlan};
pub use errors::*;
pub use finding::{
    ComplianceStatus, Finding, FindingState, RawFinding, RecordState, Severity, WorkflowStatus,
};
pub use secret::SecureString;
