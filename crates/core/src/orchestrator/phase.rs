//! Per-target state machine

use std::fmt;

use serde::Serialize;

/// Where a target is in its traversal.
///
/// `Pending → EnumeratingChecks → RunningCheck(0) → … → RunningCheck(n-1) →
/// Complete`. A failing check moves on to the next index like a succeeding
/// one does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "check_index", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetPhase {
    Pending,
    EnumeratingChecks,
    RunningCheck(usize),
    Complete,
}

impl TargetPhase {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: TargetPhase) -> bool {
        match (self, next) {
            (Self::Pending, Self::EnumeratingChecks)
            | (Self::EnumeratingChecks, Self::RunningCheck(0) | Self::Complete) => true,
            (Self::RunningCheck(i), Self::RunningCheck(j)) => j == i + 1,
            (Self::RunningCheck(_), Self::Complete) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TargetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::EnumeratingChecks => write!(f, "ENUMERATING_CHECKS"),
            Self::RunningCheck(i) => write!(f, "RUNNING_CHECK({i})"),
            Self::Complete => write!(f, "COMPLETE"),
        }
    }
}
