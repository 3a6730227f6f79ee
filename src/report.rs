//! Machine-readable run reports.
//!
//! A [`RunReport`] is assembled from a [`RunOutcome`] after the run and
//! written as pretty-printed JSON.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::runner::{RunOutcome, RunStatus};
use crate::steps::ExecutionResult;

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Local>,

    /// User the desktop was provisioned for.
    pub user: String,

    pub dry_run: bool,

    /// "completed" or "aborted"
    pub status: String,

    /// Step that stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted_at: Option<String>,

    pub exit_code: i32,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    pub steps: Vec<StepReport>,
}

/// One attempted step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ExecutionResult> for StepReport {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            name: result.step.clone(),
            status: result.status().to_string(),
            exit_code: result.exit_code,
            duration_ms: result.duration.as_millis() as u64,
            error: result.error.clone(),
        }
    }
}

impl RunReport {
    /// Build a report for a finished run.
    pub fn new(
        started_at: DateTime<Local>,
        user: &str,
        dry_run: bool,
        outcome: &RunOutcome,
    ) -> Self {
        let (status, aborted_at) = match &outcome.status {
            RunStatus::Completed => ("completed", None),
            RunStatus::AbortedAt { step, .. } => ("aborted", Some(step.clone())),
        };
        Self {
            started_at,
            user: user.to_string(),
            dry_run,
            status: status.to_string(),
            aborted_at,
            exit_code: outcome.exit_code(),
            duration_ms: outcome.duration.as_millis() as u64,
            steps: outcome.results.iter().map(StepReport::from).collect(),
        }
    }

    /// Write the report as JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?;
        fs::write(path, json)?;
        Ok(())
    }
}
