//! Check registry
//!
//! Checks are attached by an explicit initialization step (usually one
//! [`CheckPlugin`] per provider service) before the run starts. The
//! orchestrator only reads the registry, so it is shared as
//! `Arc<CheckRegistry>`.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sentinel_domain::{RawFinding, SentinelError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::check::{AuditCheck, CheckContext, CheckError, FnCheck};
use crate::normalizer::check_slug;

/// Errors raised while populating a registry. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("check '{name}' is already registered under category '{category}'")]
    Duplicate { category: String, name: String },

    #[error("check name '{name}' is invalid: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("category must not be empty (check '{name}')")]
    EmptyCategory { name: String },
}

impl From<RegistryError> for SentinelError {
    fn from(err: RegistryError) -> Self {
        SentinelError::Registration(err.to_string())
    }
}

/// Whether a check can run without a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// The check is skipped when the credential is unavailable.
    Required,
    /// The check runs and skips its enrichment path.
    Optional,
}

/// A secret a check declares it uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CredentialNeed {
    pub name: String,
    pub requirement: Requirement,
}

impl CredentialNeed {
    pub fn required(name: impl Into<String>) -> Self {
        Self { name: name.into(), requirement: Requirement::Required }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self { name: name.into(), requirement: Requirement::Optional }
    }

    pub fn is_required(&self) -> bool {
        self.requirement == Requirement::Required
    }
}

/// A registered check.
#[derive(Clone)]
pub struct CheckDescriptor {
    pub category: String,
    pub name: String,
    pub description: String,
    pub credentials: Vec<CredentialNeed>,
    pub check: Arc<dyn AuditCheck>,
}

impl CheckDescriptor {
    /// Credentials that must be available for the check to run.
    pub fn required_credentials(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().filter(|need| need.is_required()).map(|need| need.name.as_str())
    }

    pub fn summary(&self) -> CheckSummary {
        CheckSummary {
            category: self.category.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

impl fmt::Debug for CheckDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckDescriptor")
            .field("category", &self.category)
            .field("name", &self.name)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Serializable catalogue entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub category: String,
    pub name: String,
    pub description: String,
    pub credentials: Vec<CredentialNeed>,
}

/// Initialization step that attaches a group of checks.
pub trait CheckPlugin {
    /// Plugin name used in logs.
    fn name(&self) -> &str;

    fn register(&self, registry: &mut CheckRegistry) -> Result<(), RegistryError>;
}

/// Catalogue of checks keyed by (category, name).
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<CheckDescriptor>,
    index: HashMap<(String, String), usize>,
    categories: Vec<String>,
    global: HashSet<String>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `check` under `category`.
    ///
    /// # Errors
    /// [`RegistryError::Duplicate`] if (category, name) is taken, and
    /// [`RegistryError::InvalidName`] if the name cannot form a finding id.
    pub fn register(
        &mut self,
        category: impl Into<String>,
        check: impl AuditCheck + 'static,
    ) -> Result<(), RegistryError> {
        self.register_with(category, Arc::new(check), Vec::new())
    }

    /// Attach `check` together with the credentials it uses.
    pub fn register_with(
        &mut self,
        category: impl Into<String>,
        check: Arc<dyn AuditCheck>,
        credentials: Vec<CredentialNeed>,
    ) -> Result<(), RegistryError> {
        let category = category.into();
        let name = check.name().to_string();

        if category.trim().is_empty() {
            return Err(RegistryError::EmptyCategory { name });
        }
        check_slug(&name)
            .map_err(|err| RegistryError::InvalidName { name: name.clone(), reason: err.to_string() })?;

        let key = (category.clone(), name.clone());
        if self.index.contains_key(&key) {
            return Err(RegistryError::Duplicate { category, name });
        }

        if !self.categories.contains(&category) {
            self.categories.push(category.clone());
        }
        debug!(category = %category, check = %name, "registered check");

        self.index.insert(key, self.checks.len());
        self.checks.push(CheckDescriptor {
            description: check.description().to_string(),
            category,
            name,
            credentials,
            check,
        });
        Ok(())
    }

    /// Attach an async closure as a check.
    pub fn register_fn<F, Fut>(
        &mut self,
        category: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        credentials: Vec<CredentialNeed>,
        body: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(CheckContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<RawFinding>, CheckError>> + Send + 'static,
    {
        let check = FnCheck { name: name.into(), description: description.into(), body };
        self.register_with(category, Arc::new(check), credentials)
    }

    /// Run a plugin's initialization step.
    pub fn install(&mut self, plugin: &dyn CheckPlugin) -> Result<(), RegistryError> {
        let before = self.checks.len();
        plugin.register(self)?;
        debug!(plugin = plugin.name(), checks = self.checks.len() - before, "plugin installed");
        Ok(())
    }

    /// Checks under `category`, in registration order.
    pub fn checks_for<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a CheckDescriptor> + 'a {
        self.checks.iter().filter(move |descriptor| descriptor.category == category)
    }

    /// Distinct categories, in the order they were first registered.
    pub fn all_categories(&self) -> &[String] {
        &self.categories
    }

    /// Mark a category as account-wide: it runs only for the first target
    /// of each account.
    pub fn mark_global(&mut self, category: impl Into<String>) {
        self.global.insert(category.into());
    }

    pub fn is_global(&self, category: &str) -> bool {
        self.global.contains(category)
    }

    pub fn find(&self, category: &str, name: &str) -> Option<&CheckDescriptor> {
        self.index.get(&(category.to_string(), name.to_string())).map(|&i| &self.checks[i])
    }

    /// First check named `name` in any category.
    pub fn find_by_name(&self, name: &str) -> Option<&CheckDescriptor> {
        self.checks.iter().find(|descriptor| descriptor.name == name)
    }

    pub fn catalogue(&self) -> Vec<CheckSummary> {
        self.checks.iter().map(CheckDescriptor::summary).collect()
    }

    /// Distinct credential names any registered check uses.
    pub fn required_credentials(&self) -> BTreeSet<String> {
        self.checks
            .iter()
            .flat_map(|descriptor| descriptor.credentials.iter().map(|need| need.name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl fmt::Debug for CheckRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRegistry")
            .field("checks", &self.checks.len())
            .field("categories", &self.categories)
            .field("global", &self.global)
            .finish()
    }
}
