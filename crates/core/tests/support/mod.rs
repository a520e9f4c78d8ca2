//! Shared test helpers for `sentinel-core` integration tests.
//!
//! Scripted checks and secret backends so orchestrator tests can focus on
//! run behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod backends;
pub mod checks;

use std::sync::Arc;

use sentinel_core::{
    AuditOrchestrator, CheckRegistry, CredentialResolver, MemorySink, OrchestratorConfig,
    SecretBackend,
};
use sentinel_domain::GlobalCredentialsConfig;

/// Orchestrator over `registry` with a CONFIG_FILE resolver built from
/// `global`, delivering into the returned sink.
pub fn orchestrator(
    registry: CheckRegistry,
    global: &GlobalCredentialsConfig,
    backend: Arc<dyn SecretBackend>,
    config: OrchestratorConfig,
) -> (AuditOrchestrator, Arc<MemorySink>) {
    let resolver = CredentialResolver::new(global, backend).expect("valid credential config");
    let sink = Arc::new(MemorySink::new());
    let orchestrator =
        AuditOrchestrator::new(Arc::new(registry), Arc::new(resolver), sink.clone()).with_config(config);
    (orchestrator, sink)
}

/// Orchestrator with no configured secrets.
pub fn plain_orchestrator(registry: CheckRegistry) -> (AuditOrchestrator, Arc<MemorySink>) {
    orchestrator(
        registry,
        &GlobalCredentialsConfig::new("CONFIG_FILE"),
        backends::literal(),
        OrchestratorConfig::default(),
    )
}
