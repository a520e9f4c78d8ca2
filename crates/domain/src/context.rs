//! Audit target context
//!
//! A [`RunContext`] is built once per target before any check runs and is
//! shared read-only with every check invoked for that target. There are no
//! setters: a different target is a different context.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::secret::SecureString;

/// What kind of provider a target belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderKind {
    /// A cloud account evaluated per region.
    CloudAccount,
    /// A SaaS tenant; `provider` names the vendor (e.g. `servicenow`).
    SaasTenant { provider: String },
}

/// AWS partition a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    #[serde(rename = "aws")]
    Aws,
    #[serde(rename = "aws-us-gov")]
    AwsUsGov,
    #[serde(rename = "aws-cn")]
    AwsCn,
    #[serde(rename = "aws-iso")]
    AwsIso,
    #[serde(rename = "aws-iso-b")]
    AwsIsoB,
    #[serde(rename = "aws-iso-e")]
    AwsIsoE,
}

impl Partition {
    /// Derive the partition from a region name. Unknown prefixes map to the
    /// commercial partition.
    pub fn from_region(region: &str) -> Self {
        // isob/isoe must be tested before the shorter iso prefix
        if region.starts_with("us-gov-") {
            Self::AwsUsGov
        } else if region.starts_with("cn-") {
            Self::AwsCn
        } else if region.starts_with("us-isob-") {
            Self::AwsIsoB
        } else if region.starts_with("eu-isoe-") {
            Self::AwsIsoE
        } else if region.starts_with("us-iso-") {
            Self::AwsIso
        } else {
            Self::Aws
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::AwsUsGov => "aws-us-gov",
            Self::AwsCn => "aws-cn",
            Self::AwsIso => "aws-iso",
            Self::AwsIsoB => "aws-iso-b",
            Self::AwsIsoE => "aws-iso-e",
        }
    }

    /// Pseudo-region that global services (IAM, CloudFront, Global
    /// Accelerator) are addressed through in this partition.
    pub const fn global_region(&self) -> &'static str {
        match self {
            Self::Aws => "aws-global",
            Self::AwsUsGov => "aws-us-gov-global",
            Self::AwsCn => "aws-cn-global",
            Self::AwsIso => "aws-iso-global",
            Self::AwsIsoB => "aws-iso-b-global",
            Self::AwsIsoE => "aws-iso-e-global",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(Self::Aws),
            "aws-us-gov" => Ok(Self::AwsUsGov),
            "aws-cn" => Ok(Self::AwsCn),
            "aws-iso" => Ok(Self::AwsIso),
            "aws-iso-b" | "aws-isob" => Ok(Self::AwsIsoB),
            "aws-iso-e" | "aws-isoe" => Ok(Self::AwsIsoE),
            other => Err(format!("Invalid Partition: {other}")),
        }
    }
}

/// Provider-specific extras attached to a target.
///
/// Plain attributes (a tenant's instance URL, an org id) and secrets (a
/// tenant's API token) are kept apart so only the former are ever logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextExtras {
    attributes: BTreeMap<String, String>,
    secrets: BTreeMap<String, SecureString>,
}

impl ContextExtras {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_secret(mut self, key: impl Into<String>, value: SecureString) -> Self {
        self.secrets.insert(key.into(), value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn secret(&self, key: &str) -> Option<&SecureString> {
        self.secrets.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.secrets.is_empty()
    }
}

/// Immutable per-target bundle handed to every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    provider: ProviderKind,
    account_id: String,
    region: String,
    partition: String,
    extras: ContextExtras,
}

impl RunContext {
    /// Create a context for one cloud account and region. The partition is
    /// derived from the region.
    pub fn cloud(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        let partition = Partition::from_region(&region).as_str().to_string();
        Self {
            provider: ProviderKind::CloudAccount,
            account_id: account_id.into(),
            region,
            partition,
            extras: ContextExtras::default(),
        }
    }

    /// Create a context for one SaaS tenant. The provider name doubles as
    /// the namespace recorded in the partition slot of every finding.
    pub fn tenant(
        provider: impl Into<String>,
        tenant_id: impl Into<String>,
        location: impl Into<String>,
        extras: ContextExtras,
    ) -> Self {
        let provider = provider.into();
        Self {
            partition: provider.clone(),
            provider: ProviderKind::SaasTenant { provider },
            account_id: tenant_id.into(),
            region: location.into(),
            extras,
        }
    }

    /// Attach extras, consuming the context. Only used while building.
    pub fn with_extras(mut self, extras: ContextExtras) -> Self {
        self.extras = extras;
        self
    }

    pub fn provider(&self) -> &ProviderKind {
        &self.provider
    }

    /// Account id for cloud targets, tenant id for SaaS targets.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Partition name (`aws`, `aws-us-gov`, ...) or the SaaS provider name.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Typed partition for cloud targets.
    pub fn aws_partition(&self) -> Option<Partition> {
        match self.provider {
            ProviderKind::CloudAccount => self.partition.parse().ok(),
            ProviderKind::SaasTenant { .. } => None,
        }
    }

    pub fn extras(&self) -> &ContextExtras {
        &self.extras
    }

    /// Stable label used in logs and reports: `<account>/<region>`.
    pub fn label(&self) -> String {
        format!("{}/{}", self.account_id, self.region)
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.account_id, self.region, self.partition)
    }
}

/// Ordered set of targets for one run.
///
/// Targets of the same account are kept adjacent and in the order their
/// regions were listed, so "first target of an account" is well defined.
#[derive(Debug, Clone, Default)]
pub struct TargetPlan {
    targets: Vec<RunContext>,
}

impl TargetPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cross product of accounts and regions, account-major.
    pub fn cloud<A, R>(accounts: &[A], regions: &[R]) -> Self
    where
        A: AsRef<str>,
        R: AsRef<str>,
    {
        let targets = accounts
            .iter()
            .flat_map(|account| {
                regions.iter().map(move |region| RunContext::cloud(account.as_ref(), region.as_ref()))
            })
            .collect();
        Self { targets }
    }

    pub fn push(&mut self, target: RunContext) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RunContext> {
        self.targets.iter()
    }
}

impl From<Vec<RunContext>> for TargetPlan {
    fn from(targets: Vec<RunContext>) -> Self {
        Self { targets }
    }
}

impl IntoIterator for TargetPlan {
    type Item = RunContext;
    type IntoIter = std::vec::IntoIter<RunContext>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets.into_iter()
    }
}
