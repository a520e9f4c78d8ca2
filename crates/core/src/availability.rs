//! Service availability port
//!
//! Some services do not exist in every partition or region. The
//! orchestrator asks this port before running a category against a target
//! and records the category's checks as skipped when it says no.

use sentinel_domain::RunContext;

/// Whether a category's service can be audited for a target.
pub trait ServiceAvailability: Send + Sync {
    fn is_available(&self, category: &str, target: &RunContext) -> bool;
}

/// Treats every service as available everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAvailable;

impl ServiceAvailability for AlwaysAvailable {
    fn is_available(&self, _category: &str, _target: &RunContext) -> bool {
        true
    }
}

impl<F> ServiceAvailability for F
where
    F: Fn(&str, &RunContext) -> bool + Send + Sync,
{
    fn is_available(&self, category: &str, target: &RunContext) -> bool {
        self(category, target)
    }
}
