//! Recurring job definition.
//!
//! A Job pairs a work unit with an interval, the time it last ran, and the
//! sink that receives its output.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use super::interval::Interval;
use super::types::JobId;
use super::unit::WorkUnit;
use crate::sink::OutputSink;

/// Time at which a job should next fire, given when it last ran.
///
/// * Never run: due immediately (`now`).
/// * Otherwise `last_run + interval`, skipped forward to the smallest
///   `last_run + k * interval` that is not before `now` when cycles were missed.
///
/// Pure: the same inputs always give the same answer.
pub fn next_run_time(
    last_run: Option<DateTime<Utc>>,
    interval: &Interval,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match last_run {
        None => now,
        Some(last) => interval.next_after(last, now),
    }
}

/// A named, periodically recurring unit of work.
#[derive(Clone)]
pub struct Job {
    /// Unique job name.
    id: JobId,
    /// Action executed on every run.
    unit: Arc<dyn WorkUnit>,
    /// Recurrence interval.
    interval: Interval,
    /// When the job last ran (None before the first run).
    last_run: Option<DateTime<Utc>>,
    /// Destination for run output.
    sink: Arc<dyn OutputSink>,
}

impl Job {
    /// Create a new job that has never run.
    pub fn new(
        id: impl Into<JobId>,
        unit: Arc<dyn WorkUnit>,
        interval: Interval,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            id: id.into(),
            unit,
            interval,
            last_run: None,
            sink,
        }
    }

    /// Builder: set the last run time.
    pub fn with_last_run(mut self, last_run: DateTime<Utc>) -> Self {
        self.last_run = Some(last_run);
        self
    }

    /// Get the job ID.
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Get the work unit.
    pub fn unit(&self) -> &Arc<dyn WorkUnit> {
        &self.unit
    }

    /// Get the interval.
    pub fn interval(&self) -> &Interval {
        &self.interval
    }

    /// Get the last run time.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    /// Record a run.
    pub fn set_last_run(&mut self, at: Option<DateTime<Utc>>) {
        self.last_run = at;
    }

    /// Get the output sink.
    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// When this job should next fire, as seen at `now`.
    pub fn next_run_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        next_run_time(self.last_run, &self.interval, now)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("unit", &self.unit.name())
            .field("interval", &self.interval)
            .field("last_run", &self.last_run)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::unit::{WorkError, WorkOutput};
    use crate::sink::MemorySink;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    struct Noop;

    #[async_trait]
    impl WorkUnit for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        async fn run(&self) -> Result<WorkOutput, WorkError> {
            Ok(WorkOutput::default())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn job(interval: Interval) -> Job {
        Job::new("job", Arc::new(Noop), interval, Arc::new(MemorySink::new()))
    }

    #[test]
    fn test_never_run_job_is_due_now() {
        let job = job(Interval::hours(6).unwrap());

        assert_eq!(job.next_run_time(t0()), t0());
        assert!(job.last_run().is_none());
    }

    #[test]
    fn test_next_run_is_last_run_plus_interval() {
        let job = job(Interval::minutes(2).unwrap()).with_last_run(t0());

        assert_eq!(
            job.next_run_time(t0() + Duration::seconds(30)),
            t0() + Duration::minutes(2)
        );
    }

    #[test]
    fn test_missed_cycles_never_return_past_time() {
        let job = job(Interval::hours(6).unwrap()).with_last_run(t0());
        let now = t0() + Duration::hours(20);

        let next = job.next_run_time(now);

        assert_eq!(next, t0() + Duration::hours(24));
        assert!(next >= now);
    }

    #[test]
    fn test_clock_moved_backward() {
        // last_run recorded in the "future" relative to now.
        let job = job(Interval::days(1).unwrap()).with_last_run(t0());
        let now = t0() - Duration::hours(3);

        assert_eq!(job.next_run_time(now), t0() + Duration::days(1));
    }

    #[test]
    fn test_next_run_time_is_idempotent() {
        let job = job(Interval::minutes(5).unwrap()).with_last_run(t0());
        let now = t0() + Duration::minutes(17);

        assert_eq!(job.next_run_time(now), job.next_run_time(now));
    }

    #[test]
    fn test_debug_omits_trait_objects() {
        let job = job(Interval::days(1).unwrap());
        let debug = format!("{:?}", job);

        assert!(debug.contains("noop"));
        assert!(debug.contains("job"));
    }
}
