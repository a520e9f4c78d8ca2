//! Canonical finding schema
//!
//! [`RawFinding`] is what a check yields. The normalizer turns it into a
//! [`Finding`], the only shape that ever leaves the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::impl_wire_label_conversions;

/// Severity of a finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

impl_wire_label_conversions!(Severity {
    Informational => "INFORMATIONAL",
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Passed,
    Failed,
}

impl_wire_label_conversions!(ComplianceStatus {
    Passed => "PASSED",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    New,
    Resolved,
}

impl_wire_label_conversions!(WorkflowStatus {
    New => "NEW",
    Resolved => "RESOLVED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordState {
    Active,
    Archived,
}

impl_wire_label_conversions!(RecordState {
    Active => "ACTIVE",
    Archived => "ARCHIVED",
});

/// Lifecycle fields that disagree with each other.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{compliance} requires workflow {expected_workflow} and record state {expected_record}, got {workflow:?}/{record:?}")]
pub struct LifecycleMismatch {
    pub compliance: ComplianceStatus,
    pub workflow: Option<WorkflowStatus>,
    pub record: Option<RecordState>,
    pub expected_workflow: WorkflowStatus,
    pub expected_record: RecordState,
}

/// The compliance / workflow / record-state triple.
///
/// Only two combinations exist: `FAILED/NEW/ACTIVE` and
/// `PASSED/RESOLVED/ARCHIVED`. Holding the compliance status alone makes any
/// other combination unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "LifecycleFields", try_from = "LifecycleFields")]
pub struct FindingState {
    compliance: ComplianceStatus,
}

impl FindingState {
    pub const FAILED: Self = Self { compliance: ComplianceStatus::Failed };
    pub const PASSED: Self = Self { compliance: ComplianceStatus::Passed };

    pub const fn from_compliance(compliance: ComplianceStatus) -> Self {
        Self { compliance }
    }

    /// Build the triple from possibly partial fields. Absent workflow or
    /// record state is derived; a present one must agree.
    pub fn from_parts(
        compliance: ComplianceStatus,
        workflow: Option<WorkflowStatus>,
        record: Option<RecordState>,
    ) -> Result<Self, LifecycleMismatch> {
        let state = Self::from_compliance(compliance);
        let workflow_ok = workflow.map_or(true, |w| w == state.workflow_status());
        let record_ok = record.map_or(true, |r| r == state.record_state());
        if workflow_ok && record_ok {
            Ok(state)
        } else {
            Err(LifecycleMismatch {
                compliance,
                workflow,
                record,
                expected_workflow: state.workflow_status(),
                expected_record: state.record_state(),
            })
        }
    }

    pub const fn compliance_status(&self) -> ComplianceStatus {
        self.compliance
    }

    pub const fn workflow_status(&self) -> WorkflowStatus {
        match self.compliance {
            ComplianceStatus::Failed => WorkflowStatus::New,
            ComplianceStatus::Passed => WorkflowStatus::Resolved,
        }
    }

    pub const fn record_state(&self) -> RecordState {
        match self.compliance {
            ComplianceStatus::Failed => RecordState::Active,
            ComplianceStatus::Passed => RecordState::Archived,
        }
    }

    pub const fn is_failing(&self) -> bool {
        matches!(self.compliance, ComplianceStatus::Failed)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifecycleFields {
    compliance_status: ComplianceStatus,
    workflow_status: WorkflowStatus,
    record_state: RecordState,
}

impl From<FindingState> for LifecycleFields {
    fn from(state: FindingState) -> Self {
        Self {
            compliance_status: state.compliance_status(),
            workflow_status: state.workflow_status(),
            record_state: state.record_state(),
        }
    }
}

impl TryFrom<LifecycleFields> for FindingState {
    type Error = LifecycleMismatch;

    fn try_from(fields: LifecycleFields) -> Result<Self, Self::Error> {
        Self::from_parts(fields.compliance_status, Some(fields.workflow_status), Some(fields.record_state))
    }
}

/// Record yielded by a check, before normalization.
///
/// Every lifecycle field is optional so that a defective check is caught by
/// the normalizer instead of by the type system of the check author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFinding {
    pub id: Option<String>,
    pub severity: Option<Severity>,
    pub compliance_status: Option<ComplianceStatus>,
    pub workflow_status: Option<WorkflowStatus>,
    pub record_state: Option<RecordState>,
    pub resource_type: String,
    pub resource_id: String,
    pub title: String,
    pub description: String,
    pub remediation_text: String,
    pub remediation_url: Option<String>,
    pub finding_types: Vec<String>,
    pub related_requirements: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RawFinding {
    /// Create a raw finding about one resource.
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self { resource_type: resource_type.into(), resource_id: resource_id.into(), ..Self::default() }
    }

    /// Mark as failing with the given severity.
    pub fn failed(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self.compliance_status = Some(ComplianceStatus::Failed);
        self
    }

    /// Mark as passing. Passing findings are reported as informational.
    pub fn passed(mut self) -> Self {
        self.severity = Some(Severity::Informational);
        self.compliance_status = Some(ComplianceStatus::Passed);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn remediation(mut self, text: impl Into<String>, url: impl Into<String>) -> Self {
        self.remediation_text = text.into();
        self.remediation_url = Some(url.into());
        self
    }

    pub fn finding_type(mut self, finding_type: impl Into<String>) -> Self {
        self.finding_types.push(finding_type.into());
        self
    }

    /// Add a control requirement such as `"NIST CSF V1.1 ID.AM-2"`.
    pub fn requirement(mut self, requirement: impl Into<String>) -> Self {
        self.related_requirements.push(requirement.into());
        self
    }

    /// Supply an explicit id. It must still follow the stable id convention.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_workflow_status(mut self, status: WorkflowStatus) -> Self {
        self.workflow_status = Some(status);
        self
    }

    pub fn with_record_state(mut self, state: RecordState) -> Self {
        self.record_state = Some(state);
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self.updated_at = Some(at);
        self
    }
}

/// Canonical finding record consumed by downstream sinks.
///
/// `id` is `<resource-id>/<check-slug>`, so repeated runs against the same
/// resource and check produce the same id and the sink updates in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    pub check_name: String,
    pub category: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub state: FindingState,
    pub resource_type: String,
    pub resource_id: String,
    pub title: String,
    pub description: String,
    pub remediation_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finding_types: Vec<String>,
    pub related_requirements: Vec<String>,
    pub control_mappings: BTreeMap<String, Vec<String>>,
    pub account_id: String,
    pub region: String,
    pub partition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Finding {
    pub fn compliance_status(&self) -> ComplianceStatus {
        self.state.compliance_status()
    }

    pub fn workflow_status(&self) -> WorkflowStatus {
        self.state.workflow_status()
    }

    pub fn record_state(&self) -> RecordState {
        self.state.record_state()
    }
}
