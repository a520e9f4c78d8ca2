//! Run report
//!
//! Every completed run produces a [`RunReport`], even when no finding was
//! delivered, so callers can always tell how many checks succeeded, failed
//! or were skipped and why.

use chrono::{DateTime, Utc};
use sentinel_common::{CacheStats, ErrorSeverity};
use serde::Serialize;
use uuid::Uuid;

use super::phase::TargetPhase;

/// Why a check did not run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// A credential the check requires resolved as unavailable.
    MissingCredential { credential: String },
    /// The service does not exist in the target's partition or region.
    ServiceUnavailable,
    /// The run deadline passed before the check started.
    DeadlineExceeded,
}

/// How one check invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    Succeeded,
    Failed { cause: String, severity: ErrorSeverity, retryable: bool },
    Skipped(SkipReason),
}

impl CheckOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Result of one check against one target.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub category: String,
    pub check: String,
    pub outcome: CheckOutcome,
    pub findings_delivered: usize,
    pub findings_rejected: usize,
    pub sink_failures: usize,
    pub duration_ms: u64,
}

impl CheckReport {
    pub(crate) fn skipped(category: &str, check: &str, reason: SkipReason) -> Self {
        Self {
            category: category.to_string(),
            check: check.to_string(),
            outcome: CheckOutcome::Skipped(reason),
            findings_delivered: 0,
            findings_rejected: 0,
            sink_failures: 0,
            duration_ms: 0,
        }
    }
}

/// Result of one target traversal.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub account_id: String,
    pub region: String,
    pub partition: String,
    pub phase: TargetPhase,
    pub transitions: Vec<TargetPhase>,
    pub checks: Vec<CheckReport>,
    pub cache: CacheStats,
}

impl TargetReport {
    pub fn is_complete(&self) -> bool {
        self.phase == TargetPhase::Complete
    }
}

/// A check that failed, with enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub category: String,
    pub check: String,
    pub target: String,
    pub cause: String,
    pub severity: ErrorSeverity,
    pub retryable: bool,
}

/// Aggregate counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub checks_succeeded: usize,
    pub checks_failed: usize,
    pub skipped_missing_credential: usize,
    pub skipped_service_unavailable: usize,
    pub skipped_deadline: usize,
    pub targets_completed: usize,
    pub findings_delivered: usize,
    pub findings_rejected: usize,
    pub sink_failures: usize,
}

impl RunTotals {
    pub fn checks_skipped(&self) -> usize {
        self.skipped_missing_credential + self.skipped_service_unavailable + self.skipped_deadline
    }

    fn add(&mut self, check: &CheckReport) {
        match &check.outcome {
            CheckOutcome::Succeeded => self.checks_succeeded += 1,
            CheckOutcome::Failed { .. } => self.checks_failed += 1,
            CheckOutcome::Skipped(SkipReason::MissingCredential { .. }) => {
                self.skipped_missing_credential += 1;
            }
            CheckOutcome::Skipped(SkipReason::ServiceUnavailable) => {
                self.skipped_service_unavailable += 1;
            }
            CheckOutcome::Skipped(SkipReason::DeadlineExceeded) => self.skipped_deadline += 1,
        }
        self.findings_delivered += check.findings_delivered;
        self.findings_rejected += check.findings_rejected;
        self.sink_failures += check.sink_failures;
    }
}

/// Structured summary of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub targets: Vec<TargetReport>,
    pub totals: RunTotals,
    pub errors: Vec<CheckFailure>,
}

impl RunReport {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        targets: Vec<TargetReport>,
    ) -> Self {
        let mut totals = RunTotals::default();
        let mut errors = Vec::new();

        for target in &targets {
            if target.is_complete() {
                totals.targets_completed += 1;
            }
            for check in &target.checks {
                totals.add(check);
                if let CheckOutcome::Failed { cause, severity, retryable } = &check.outcome {
                    errors.push(CheckFailure {
                        category: check.category.clone(),
                        check: check.check.clone(),
                        target: target.target.clone(),
                        cause: cause.clone(),
                        severity: *severity,
                        retryable: *retryable,
                    });
                }
            }
        }

        Self { run_id, started_at, finished_at: Utc::now(), targets, totals, errors }
    }

    /// Failures at `severity` or above, most severe first.
    pub fn failures_at_least(&self, severity: ErrorSeverity) -> Vec<&CheckFailure> {
        let mut failures: Vec<&CheckFailure> =
            self.errors.iter().filter(|failure| failure.severity >= severity).collect();
        failures.sort_by(|a, b| b.severity.cmp(&a.severity));
        failures
    }

    /// Whether every check that ran succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Report of the target labelled `target` (`<account>/<region>`).
    pub fn target(&self, target: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|report| report.target == target)
    }

    /// All reports for check `name`, across targets.
    pub fn check_reports<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CheckReport> + 'a {
        self.targets.iter().flat_map(|t| t.checks.iter()).filter(move |c| c.check == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(name: &str, outcome: CheckOutcome, delivered: usize) -> CheckReport {
        CheckReport {
            category: "mq".into(),
            check: name.into(),
            outcome,
            findings_delivered: delivered,
            findings_rejected: 0,
            sink_failures: 0,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_totals_and_errors_are_aggregated() {
        let target = TargetReport {
            target: "111111111111/us-east-1".into(),
            account_id: "111111111111".into(),
            region: "us-east-1".into(),
            partition: "aws".into(),
            phase: TargetPhase::Complete,
            transitions: vec![TargetPhase::Pending, TargetPhase::Complete],
            checks: vec![
                check("a_check", CheckOutcome::Succeeded, 2),
                check(
                    "b_check",
                    CheckOutcome::Failed {
                        cause: "throttled".into(),
                        severity: ErrorSeverity::Warning,
                        retryable: true,
                    },
                    1,
                ),
                check(
                    "e_check",
                    CheckOutcome::Failed {
                        cause: "check panicked: index out of bounds".into(),
                        severity: ErrorSeverity::Critical,
                        retryable: false,
                    },
                    0,
                ),
                check(
                    "c_check",
                    CheckOutcome::Skipped(SkipReason::MissingCredential {
                        credential: "shodan_api_key".into(),
                    }),
                    0,
                ),
                CheckReport::skipped("mq", "d_check", SkipReason::DeadlineExceeded),
            ],
            cache: CacheStats::default(),
        };

        let report = RunReport::new(Uuid::now_v7(), Utc::now(), vec![target]);

        assert_eq!(report.totals.checks_succeeded, 1);
        assert_eq!(report.totals.checks_failed, 2);
        assert_eq!(report.totals.checks_skipped(), 2);
        assert_eq!(report.totals.findings_delivered, 3);
        assert_eq!(report.totals.targets_completed, 1);
        assert_eq!(
            report.errors[0],
            CheckFailure {
                category: "mq".into(),
                check: "b_check".into(),
                target: "111111111111/us-east-1".into(),
                cause: "throttled".into(),
                severity: ErrorSeverity::Warning,
                retryable: true,
            }
        );
        let critical = report.failures_at_least(ErrorSeverity::Error);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].check, "e_check");
        assert_eq!(report.failures_at_least(ErrorSeverity::Info)[0].check, "e_check");
        assert!(!report.is_clean());
        assert_eq!(report.check_reports("a_check").count(), 1);
    }

    #[test]
    fn test_empty_run_still_reports() {
        let report = RunReport::new(Uuid::now_v7(), Utc::now(), Vec::new());
        assert!(report.is_clean());
        assert_eq!(report.totals, RunTotals::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totals"]["checks_succeeded"], 0);
    }

    #[test]
    fn test_outcome_serialization() {
        let skipped = CheckOutcome::Skipped(SkipReason::MissingCredential {
            credential: "shodan_api_key".into(),
        });
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "missing_credential");
        assert_eq!(json["credential"], "shodan_api_key");

        let failed = CheckOutcome::Failed {
            cause: "run deadline exceeded".into(),
            severity: ErrorSeverity::Warning,
            retryable: false,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["retryable"], false);
    }
}
