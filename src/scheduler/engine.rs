//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Restoring each job's last run time on startup
//! - Picking the job whose next run is soonest
//! - Sleeping until it is due and executing it
//! - Writing the run's output to the job's sink
//! - Persisting the new last run time
//!
//! Jobs run strictly one at a time.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Instant;

use super::types::{JobRun, RunOutcome, SchedulerError, Upcoming};
use crate::core::clock::{Clock, SystemClock};
use crate::core::job::Job;
use crate::core::types::JobId;
use crate::storage::LastRunStore;

/// Timestamp format used in sink lines.
pub const SINK_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// The recurring job scheduler.
pub struct Scheduler {
    jobs: Vec<Job>,
    store: Arc<dyn LastRunStore>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    /// Create a scheduler with the given store and clock.
    pub fn new(store: Arc<dyn LastRunStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: Vec::new(),
            store,
            clock,
        }
    }

    /// Create a scheduler driven by the system clock.
    pub fn with_system_clock(store: Arc<dyn LastRunStore>) -> Self {
        Self::new(store, Arc::new(SystemClock))
    }

    /// Register a job. Registration order breaks ties between jobs due at
    /// the same instant.
    pub fn register(&mut self, job: Job) -> Result<(), SchedulerError> {
        if self.get_job(job.id()).is_some() {
            return Err(SchedulerError::DuplicateJob(job.id().clone()));
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Get a job by ID.
    pub fn get_job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    /// Registered jobs, in registration order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Load every job's last run time from the store.
    ///
    /// A job whose record cannot be read is treated as never run.
    /// Returns the number of jobs with a restored last run.
    pub async fn recover(&mut self) -> usize {
        let mut restored = 0;
        for job in &mut self.jobs {
            let last_run = match self.store.load_last_run(job.id()).await {
                Ok(last_run) => last_run,
                Err(e) => {
                    tracing::warn!(
                        job_id = %job.id(),
                        error = %e,
                        "Failed to load last run, treating job as never run"
                    );
                    None
                }
            };
            if let Some(at) = last_run {
                tracing::debug!(job_id = %job.id(), last_run = %at, "Restored last run");
                restored += 1;
            }
            job.set_last_run(last_run);
        }
        tracing::info!(jobs = self.jobs.len(), restored, "Scheduler state recovered");
        restored
    }

    /// Every job's last and next run as seen at `now`, in registration order.
    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Upcoming> {
        self.jobs
            .iter()
            .map(|job| Upcoming {
                job_id: job.id().clone(),
                last_run: job.last_run(),
                next_run: job.next_run_time(now),
            })
            .collect()
    }

    /// Index and due time of the job that fires next. The first registered
    /// job wins ties.
    pub fn next_due(&self, now: DateTime<Utc>) -> Option<(usize, DateTime<Utc>)> {
        let mut best: Option<(usize, DateTime<Utc>)> = None;
        for (index, job) in self.jobs.iter().enumerate() {
            let next = job.next_run_time(now);
            if best.is_none_or(|(_, due)| next < due) {
                best = Some((index, next));
            }
        }
        best
    }

    /// Run one iteration: wait for the soonest job, execute it, record it.
    pub async fn step(&mut self) -> Result<JobRun, SchedulerError> {
        let now = self.clock.now();
        let (index, due_at) = self.next_due(now).ok_or(SchedulerError::NoJobs)?;

        if due_at > now {
            tracing::debug!(
                job_id = %self.jobs[index].id(),
                due_at = %due_at,
                "Sleeping until next job is due"
            );
            self.clock.sleep_until(due_at).await;
        }

        let job = &self.jobs[index];
        tracing::info!(job_id = %job.id(), "Running job");
        let started = Instant::now();
        let outcome = execute(job, self.clock.as_ref()).await;
        let elapsed = started.elapsed();

        let finished_at = self.clock.now();
        let job = &mut self.jobs[index];
        job.set_last_run(Some(finished_at));
        if let Err(e) = self.store.save_last_run(job.id(), finished_at).await {
            tracing::warn!(job_id = %job.id(), error = %e, "Failed to persist last run");
        }

        Ok(JobRun {
            job_id: job.id().clone(),
            due_at,
            finished_at,
            elapsed,
            outcome,
        })
    }

    /// Recover state, then run jobs forever.
    ///
    /// Only returns on error; stop it by dropping the future.
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        if self.jobs.is_empty() {
            return Err(SchedulerError::NoJobs);
        }
        self.recover().await;
        tracing::info!(jobs = self.jobs.len(), "Scheduler started");
        loop {
            self.step().await?;
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("jobs", &self.jobs).finish()
    }
}

/// Execute a job's work unit and write the result to its sink.
///
/// One line per stdout line on success, a single line on failure.
async fn execute(job: &Job, clock: &dyn Clock) -> RunOutcome {
    let result = job.unit().run().await;
    let stamp = clock.now().format(SINK_TIMESTAMP_FORMAT).to_string();

    let (lines, outcome): (Vec<String>, RunOutcome) = match result {
        Ok(output) => {
            let lines: Vec<String> = output
                .lines()
                .map(|line| {
                    format!("{stamp} - Task {} executed successfully, output: {line}", job.id())
                })
                .collect();
            let count = lines.len();
            let elapsed_ms = output.elapsed.as_millis() as u64;
            tracing::info!(job_id = %job.id(), lines = count, elapsed_ms, "Job succeeded");
            (lines, RunOutcome::Succeeded { lines: count })
        }
        Err(e) => {
            tracing::error!(job_id = %job.id(), error = %e, "Job failed");
            let line = format!("{stamp} - Task {} execution failed: {e}", job.id());
            (vec![line], RunOutcome::Failed { error: e.to_string() })
        }
    };

    for line in &lines {
        if let Err(e) = job.sink().append_line(line) {
            tracing::warn!(job_id = %job.id(), error = %e, "Failed to write job output");
            break;
        }
    }
    outcome
}

/// Human-readable rendering of a due time, used by the CLI.
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
