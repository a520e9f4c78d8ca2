//! Finding normalizer
//!
//! Turns a check's [`RawFinding`] into the canonical [`Finding`] or rejects
//! it. Rejection drops only the offending record; the check keeps running.
//!
//! Finding ids follow one convention: `<resource-id>/<check-slug>`, where the
//! slug is the check name lower-cased with `_` replaced by `-`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sentinel_domain::constants::FINDING_ID_SEPARATOR;
use sentinel_domain::finding::LifecycleMismatch;
use sentinel_domain::{Finding, FindingState, RawFinding, RunContext, SentinelError};
use thiserror::Error;

static CHECK_SLUG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("CHECK_SLUG should compile - this is a bug")
});

/// Reasons a raw finding is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("severity is missing")]
    MissingSeverity,

    #[error("compliance status is missing")]
    MissingComplianceStatus,

    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleMismatch),

    #[error("resource id '{resource_id}' is invalid: {reason}")]
    InvalidResourceId { resource_id: String, reason: &'static str },

    #[error("check name '{check}' does not produce a valid slug ('{slug}')")]
    InvalidCheckSlug { check: String, slug: String },

    #[error("finding id '{actual}' does not match expected '{expected}'")]
    IdMismatch { expected: String, actual: String },
}

impl From<NormalizationError> for SentinelError {
    fn from(err: NormalizationError) -> Self {
        SentinelError::Normalization(err.to_string())
    }
}

/// Slug of a check name: lower case, `_` replaced by `-`.
///
/// # Errors
/// [`NormalizationError::InvalidCheckSlug`] if the result is not a sequence
/// of `[a-z0-9]+` groups joined by single dashes.
pub fn check_slug(check_name: &str) -> Result<String, NormalizationError> {
    let slug = check_name.to_lowercase().replace('_', "-");
    if CHECK_SLUG.is_match(&slug) {
        Ok(slug)
    } else {
        Err(NormalizationError::InvalidCheckSlug { check: check_name.to_string(), slug })
    }
}

/// Stable id for a resource/check pair.
pub fn finding_id(resource_id: &str, check_name: &str) -> Result<String, NormalizationError> {
    validate_resource_id(resource_id)?;
    Ok(format!("{resource_id}{FINDING_ID_SEPARATOR}{}", check_slug(check_name)?))
}

/// Split a requirement such as `"NIST CSF V1.1 DE.AE-2"` into framework and
/// control id. The control id is the last whitespace-separated token.
pub fn parse_requirement(requirement: &str) -> Option<(&str, &str)> {
    let (framework, control) = requirement.trim().rsplit_once(char::is_whitespace)?;
    let framework = framework.trim_end();
    if framework.is_empty() || control.is_empty() {
        return None;
    }
    Some((framework, control))
}

/// Group requirements by framework. Strings without a framework prefix are
/// kept in `relatedRequirements` only.
pub fn control_mappings(requirements: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut mappings: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for requirement in requirements {
        if let Some((framework, control)) = parse_requirement(requirement) {
            let controls = mappings.entry(framework.to_string()).or_default();
            if !controls.iter().any(|existing| existing == control) {
                controls.push(control.to_string());
            }
        }
    }
    mappings
}

fn validate_resource_id(resource_id: &str) -> Result<(), NormalizationError> {
    let reason = if resource_id.is_empty() {
        "must not be empty"
    } else if resource_id.chars().any(char::is_whitespace) {
        "must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(NormalizationError::InvalidResourceId { resource_id: resource_id.to_string(), reason })
}

/// Enforces the canonical finding contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindingNormalizer;

impl FindingNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize with the current time as the observation time.
    pub fn normalize(
        &self,
        raw: RawFinding,
        category: &str,
        check_name: &str,
        target: &RunContext,
    ) -> Result<Finding, NormalizationError> {
        self.normalize_at(raw, category, check_name, target, Utc::now())
    }

    /// Normalize `raw`, stamping `observed_at` where the check left the
    /// timestamps empty.
    pub fn normalize_at(
        &self,
        raw: RawFinding,
        category: &str,
        check_name: &str,
        target: &RunContext,
        observed_at: DateTime<Utc>,
    ) -> Result<Finding, NormalizationError> {
        let severity = raw.severity.ok_or(NormalizationError::MissingSeverity)?;
        let compliance = raw.compliance_status.ok_or(NormalizationError::MissingComplianceStatus)?;
        let state = FindingState::from_parts(compliance, raw.workflow_status, raw.record_state)?;

        if raw.resource_type.trim().is_empty() {
            return Err(NormalizationError::EmptyField("resourceType"));
        }

        let id = finding_id(&raw.resource_id, check_name)?;
        if let Some(supplied) = raw.id {
            if supplied != id {
                return Err(NormalizationError::IdMismatch { expected: id, actual: supplied });
            }
        }

        let created_at = raw.created_at.unwrap_or(observed_at);
        let updated_at = raw.updated_at.unwrap_or(observed_at).max(created_at);
        let control_mappings = control_mappings(&raw.related_requirements);

        Ok(Finding {
            id,
            check_name: check_name.to_string(),
            category: category.to_string(),
            severity,
            state,
            resource_type: raw.resource_type,
            resource_id: raw.resource_id,
            title: raw.title,
            description: raw.description,
            remediation_text: raw.remediation_text,
            remediation_url: raw.remediation_url,
            finding_types: raw.finding_types,
            related_requirements: raw.related_requirements,
            control_mappings,
            account_id: target.account_id().to_string(),
            region: target.region().to_string(),
            partition: target.partition().to_string(),
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sentinel_domain::{ComplianceStatus, RecordState, Severity, WorkflowStatus};

    use super::*;

    const BROKER: &str = "arn:aws:mq:us-east-1:111111111111:broker:b-1";
    const CHECK: &str = "mq_broker_public_access_check";

    fn target() -> RunContext {
        RunContext::cloud("111111111111", "us-east-1")
    }

    fn observed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_check_slug() {
        assert_eq!(check_slug(CHECK).unwrap(), "mq-broker-public-access-check");
        assert_eq!(check_slug("EC2_IMDSv2_Check").unwrap(), "ec2-imdsv2-check");
        assert!(check_slug("double__underscore").is_err());
        assert!(check_slug("trailing_").is_err());
        assert!(check_slug("dots.are.bad").is_err());
        assert!(check_slug("").is_err());
    }

    #[test]
    fn test_parse_requirement() {
        assert_eq!(parse_requirement("NIST CSF DE.AE-2"), Some(("NIST CSF", "DE.AE-2")));
        assert_eq!(
            parse_requirement("NIST SP 800-53 Rev. 4 AC-3"),
            Some(("NIST SP 800-53 Rev. 4", "AC-3"))
        );
        assert_eq!(parse_requirement("ISO27001"), None);
        assert_eq!(parse_requirement("  "), None);
    }

    #[test]
    fn test_control_mappings_group_and_dedupe() {
        let mappings = control_mappings(&[
            "NIST CSF V1.1 PR.AC-3".to_string(),
            "NIST CSF V1.1 PR.AC-3".to_string(),
            "NIST CSF V1.1 PR.PT-4".to_string(),
            "AICPA TSC CC6.6".to_string(),
            "standalone".to_string(),
        ]);
        assert_eq!(mappings["NIST CSF V1.1"], vec!["PR.AC-3", "PR.PT-4"]);
        assert_eq!(mappings["AICPA TSC"], vec!["CC6.6"]);
        assert_eq!(mappings.len(), 2);
    }

    #[test]
    fn test_failed_finding_gets_full_lifecycle_and_context() {
        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .failed(Severity::Critical)
            .requirement("NIST CSF V1.1 PR.AC-3");

        let finding =
            FindingNormalizer::new().normalize_at(raw, "mq", CHECK, &target(), observed()).unwrap();

        assert_eq!(finding.id, format!("{BROKER}/mq-broker-public-access-check"));
        assert_eq!(finding.compliance_status(), ComplianceStatus::Failed);
        assert_eq!(finding.workflow_status(), WorkflowStatus::New);
        assert_eq!(finding.record_state(), RecordState::Active);
        assert_eq!(finding.account_id, "111111111111");
        assert_eq!(finding.partition, "aws");
        assert_eq!(finding.created_at, observed());
        assert_eq!(finding.updated_at, observed());
        assert_eq!(finding.control_mappings["NIST CSF V1.1"], vec!["PR.AC-3"]);
    }

    #[test]
    fn test_inconsistent_lifecycle_is_rejected() {
        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .failed(Severity::High)
            .with_workflow_status(WorkflowStatus::Resolved);
        let err = FindingNormalizer::new().normalize(raw, "mq", CHECK, &target()).unwrap_err();
        assert!(matches!(err, NormalizationError::Lifecycle(_)));

        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .passed()
            .with_record_state(RecordState::Active);
        assert!(FindingNormalizer::new().normalize(raw, "mq", CHECK, &target()).is_err());
    }

    #[test]
    fn test_consistent_explicit_lifecycle_is_accepted() {
        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .passed()
            .with_workflow_status(WorkflowStatus::Resolved)
            .with_record_state(RecordState::Archived);
        let finding = FindingNormalizer::new().normalize(raw, "mq", CHECK, &target()).unwrap();
        assert_eq!(finding.record_state(), RecordState::Archived);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let normalizer = FindingNormalizer::new();

        let mut raw = RawFinding::new("AwsMqBroker", BROKER).failed(Severity::Low);
        raw.severity = None;
        assert_eq!(
            normalizer.normalize(raw, "mq", CHECK, &target()).unwrap_err(),
            NormalizationError::MissingSeverity
        );

        let mut raw = RawFinding::new("AwsMqBroker", BROKER).failed(Severity::Low);
        raw.compliance_status = None;
        assert_eq!(
            normalizer.normalize(raw, "mq", CHECK, &target()).unwrap_err(),
            NormalizationError::MissingComplianceStatus
        );

        let raw = RawFinding::new("", BROKER).failed(Severity::Low);
        assert_eq!(
            normalizer.normalize(raw, "mq", CHECK, &target()).unwrap_err(),
            NormalizationError::EmptyField("resourceType")
        );
    }

    #[test]
    fn test_resource_id_validation() {
        let normalizer = FindingNormalizer::new();
        for bad in ["", "arn:aws:mq broker"] {
            let raw = RawFinding::new("AwsMqBroker", bad).failed(Severity::Low);
            let err = normalizer.normalize(raw, "mq", CHECK, &target()).unwrap_err();
            assert!(matches!(err, NormalizationError::InvalidResourceId { .. }));
        }
    }

    #[test]
    fn test_supplied_id_must_match_convention() {
        let normalizer = FindingNormalizer::new();

        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .failed(Severity::Low)
            .with_id(format!("{BROKER}/mq-broker-public-access-check"));
        assert!(normalizer.normalize(raw, "mq", CHECK, &target()).is_ok());

        let raw = RawFinding::new("AwsMqBroker", BROKER)
            .failed(Severity::Low)
            .with_id(format!("{BROKER}/b-1.mq.amazonaws.com/mq-broker-public-access-check"));
        let err = normalizer.normalize(raw, "mq", CHECK, &target()).unwrap_err();
        assert!(matches!(err, NormalizationError::IdMismatch { .. }));
    }

    #[test]
    fn test_ids_are_stable_across_observations() {
        let normalizer = FindingNormalizer::new();
        let later = observed() + chrono::Duration::hours(24);
        let raw = || RawFinding::new("AwsMqBroker", BROKER).failed(Severity::High);

        let first = normalizer.normalize_at(raw(), "mq", CHECK, &target(), observed()).unwrap();
        let second = normalizer.normalize_at(raw(), "mq", CHECK, &target(), later).unwrap();

        assert_eq!(first.id, second.id);
        assert_ne!(first.created_at, second.created_at);
    }

    #[test]
    fn test_check_supplied_timestamps_are_kept() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let raw = RawFinding::new("AwsMqBroker", BROKER).passed().observed_at(at);
        let finding =
            FindingNormalizer::new().normalize_at(raw, "mq", CHECK, &target(), observed()).unwrap();
        assert_eq!(finding.created_at, at);
        assert_eq!(finding.updated_at, at);
    }
}
