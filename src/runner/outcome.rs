//! Final state of a provisioning run.

use std::time::Duration;

use crate::steps::{ExecutionResult, StepStatus};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step ran; failures, if any, were under `LogAndContinue`.
    Completed,

    /// A failing step stopped the run.
    AbortedAt { step: String, exit_code: i32 },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::AbortedAt { step, exit_code } => {
                write!(f, "aborted at '{}' (exit {})", step, exit_code)
            }
        }
    }
}

/// Results of a run, in execution order.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// One entry per attempted step.
    pub results: Vec<ExecutionResult>,

    pub status: RunStatus,

    /// Wall-clock time of the whole run.
    pub duration: Duration,
}

impl RunOutcome {
    /// Process exit status for this run.
    pub fn exit_code(&self) -> i32 {
        match &self.status {
            RunStatus::Completed => 0,
            RunStatus::AbortedAt { exit_code, .. } => *exit_code,
        }
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    /// Count of results with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.results.iter().filter(|r| r.status() == status).count()
    }
}
