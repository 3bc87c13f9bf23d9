//! Scheduler type definitions.
//!
//! This module contains the error type and the run reports produced by the
//! scheduler.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::types::JobId;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// There is nothing to schedule.
    #[error("no jobs registered")]
    NoJobs,

    /// A job with this name is already registered.
    #[error("duplicate job name: {0}")]
    DuplicateJob(JobId),
}

/// How a single execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The work unit succeeded; `lines` output lines were produced.
    Succeeded { lines: usize },
    /// The work unit failed with this message.
    Failed { error: String },
}

impl RunOutcome {
    /// Check if the run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

/// Report of one scheduler iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    /// The job that fired.
    pub job_id: JobId,
    /// When the job was due.
    pub due_at: DateTime<Utc>,
    /// The job's new last run time.
    pub finished_at: DateTime<Utc>,
    /// Time spent in the work unit.
    pub elapsed: Duration,
    /// Result of the execution.
    pub outcome: RunOutcome,
}

/// A job's schedule as seen at some instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upcoming {
    /// Job name.
    pub job_id: JobId,
    /// When the job last ran.
    pub last_run: Option<DateTime<Utc>>,
    /// When the job will next fire.
    pub next_run: DateTime<Utc>,
}
