//! Testing utilities for users of the cadence library.
//!
//! This module provides helpers for testing schedules and dispatch:
//!
//! - [`ManualClock`]: A clock that only moves when told to (or when slept on)
//! - [`FlakyUnit`]: A work unit that fails N times then succeeds
//! - [`FlakyProcessor`]: An item processor that fails each item N times
//! - [`FailingStore`]: A last-run store whose every operation fails

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::core::clock::Clock;
use crate::core::types::{ItemId, JobId};
use crate::core::unit::{WorkError, WorkOutput, WorkUnit};
use crate::dispatch::{ItemProcessor, WorkItem};
use crate::storage::{LastRunStore, StorageError};

/// A clock whose time is set by the test.
///
/// `sleep_until` returns at once after moving the clock forward to the
/// deadline, so a scheduler driven by it never waits in real time.
///
/// # Example
///
/// ```
/// use cadence::testing::ManualClock;
/// use cadence::Clock;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::minutes(2));
/// assert_eq!(clock.now(), start + Duration::minutes(2));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    sleeps: AtomicUsize,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
            sleeps: AtomicUsize::new(0),
        }
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = at;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Number of `sleep_until` calls that had to wait.
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        if deadline > *now {
            *now = deadline;
            self.sleeps.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// A work unit that fails a set number of times, then succeeds.
///
/// Useful for testing failure handling.
///
/// # Example
///
/// ```
/// use cadence::testing::FlakyUnit;
///
/// // Fails 2 times, then prints "done"
/// let unit = FlakyUnit::new("flaky_job", 2, "done");
/// ```
#[derive(Debug)]
pub struct FlakyUnit {
    name: String,
    output: String,
    error_message: String,
    /// Guards the failure state under concurrent runs.
    state: Mutex<FlakyState>,
}

#[derive(Debug)]
struct FlakyState {
    failures_remaining: u32,
    call_count: u32,
}

impl FlakyUnit {
    /// Create a unit that fails `fail_count` times, then prints `output`.
    pub fn new(name: impl Into<String>, fail_count: u32, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: output.into(),
            error_message: "intentional test failure".to_string(),
            state: Mutex::new(FlakyState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
        }
    }

    /// Builder: fail with a custom message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Number of times the unit has run.
    pub async fn call_count(&self) -> u32 {
        self.state.lock().await.call_count
    }

    /// Failures left before the unit starts succeeding.
    pub async fn failures_remaining(&self) -> u32 {
        self.state.lock().await.failures_remaining
    }
}

#[async_trait]
impl WorkUnit for FlakyUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<WorkOutput, WorkError> {
        let mut state = self.state.lock().await;
        state.call_count += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(WorkError::ExecutionFailed(self.error_message.clone()));
        }
        Ok(WorkOutput::from_stdout(self.output.clone()))
    }
}

/// An item processor that fails every item a set number of times before
/// echoing its payload back.
#[derive(Debug)]
pub struct FlakyProcessor {
    fail_count: u32,
    /// Items that never succeed.
    always_fail: Vec<ItemId>,
    calls: Mutex<HashMap<ItemId, u32>>,
}

impl FlakyProcessor {
    /// Fail each item `fail_count` times, then succeed.
    pub fn new(fail_count: u32) -> Self {
        Self {
            fail_count,
            always_fail: Vec::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Builder: make `id` fail on every attempt.
    pub fn always_failing(mut self, id: impl Into<ItemId>) -> Self {
        self.always_fail.push(id.into());
        self
    }

    /// Attempts made on one item.
    pub async fn calls(&self, id: &ItemId) -> u32 {
        self.calls.lock().await.get(id).copied().unwrap_or(0)
    }

    /// Attempts made across all items.
    pub async fn total_calls(&self) -> u32 {
        self.calls.lock().await.values().sum()
    }
}

#[async_trait]
impl<T> ItemProcessor<T, T> for FlakyProcessor
where
    T: Clone + Send + Sync,
{
    async fn process(&self, item: &WorkItem<T>) -> Result<T, WorkError> {
        let attempt = {
            let mut calls = self.calls.lock().await;
            let count = calls.entry(item.id.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if attempt <= self.fail_count || self.always_fail.contains(&item.id) {
            return Err(WorkError::Transient(format!(
                "{} attempt {attempt} failed",
                item.id
            )));
        }
        Ok(item.payload.clone())
    }
}

/// A last-run store that fails every read and write.
#[derive(Debug, Default)]
pub struct FailingStore {
    saves: AtomicUsize,
}

impl FailingStore {
    /// Create a failing store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of save attempts seen.
    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn error(job: &JobId) -> StorageError {
        StorageError::Io {
            job: job.clone(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "store unavailable"),
        }
    }
}

#[async_trait]
impl LastRunStore for FailingStore {
    async fn load_last_run(&self, job: &JobId) -> Result<Option<DateTime<Utc>>, StorageError> {
        Err(Self::error(job))
    }

    async fn save_last_run(&self, job: &JobId, _at: DateTime<Utc>) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(Self::error(job))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_moves_time_forward() {
        let clock = ManualClock::new(t0());

        clock.sleep_until(t0() + Duration::hours(1)).await;
        clock.sleep_until(t0()).await;

        assert_eq!(clock.now(), t0() + Duration::hours(1));
        assert_eq!(clock.sleeps(), 1);
    }

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(t0());

        clock.set(t0() + Duration::days(1));
        clock.advance(Duration::seconds(5));

        assert_eq!(clock.now(), t0() + Duration::days(1) + Duration::seconds(5));
    }

    #[tokio::test]
    async fn test_flaky_unit_fails_then_succeeds() {
        let unit = FlakyUnit::new("flaky", 2, "ok").with_error("nope");

        assert!(unit.run().await.is_err());
        assert!(unit.run().await.is_err());
        let output = unit.run().await.unwrap();

        assert_eq!(output.stdout, "ok");
        assert_eq!(unit.call_count().await, 3);
        assert_eq!(unit.failures_remaining().await, 0);
    }

    #[tokio::test]
    async fn test_flaky_processor_counts_per_item() {
        let processor = FlakyProcessor::new(1).always_failing("b");
        let a = WorkItem::new("a", 1u8);
        let b = WorkItem::new("b", 2u8);

        assert!(processor.process(&a).await.is_err());
        assert_eq!(processor.process(&a).await.unwrap(), 1);
        assert!(processor.process(&b).await.is_err());
        assert!(processor.process(&b).await.is_err());

        assert_eq!(processor.calls(&ItemId::new("a")).await, 2);
        assert_eq!(processor.total_calls().await, 4);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = FailingStore::new();
        let job = JobId::new("x");

        assert!(store.load_last_run(&job).await.is_err());
        assert!(store.save_last_run(&job, t0()).await.is_err());
        assert_eq!(store.save_attempts(), 1);
    }
}
