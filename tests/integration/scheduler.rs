//! End-to-end scheduling with a manual clock.

use crate::common::{echo_job, t0};
use cadence::testing::{FailingStore, FlakyUnit, ManualClock};
use cadence::{
    Clock, FileLastRunStore, InMemoryLastRunStore, Interval, Job, JobId, LastRunStore,
    MemorySink, OutputSink, Scheduler,
};
use chrono::Duration;
use std::sync::Arc;

#[tokio::test]
async fn test_jobs_interleave_by_next_run() {
    let clock = Arc::new(ManualClock::new(t0()));
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = Scheduler::new(Arc::new(InMemoryLastRunStore::new()), clock.clone());
    scheduler
        .register(echo_job("A", Interval::minutes(2).unwrap(), "a", sink.clone()))
        .unwrap();
    scheduler
        .register(echo_job("B", Interval::hours(6).unwrap(), "b", sink.clone()))
        .unwrap();
    scheduler
        .register(echo_job("C", Interval::days(1).unwrap(), "c", sink.clone()))
        .unwrap();

    let mut fired = Vec::new();
    for _ in 0..4 {
        let run = scheduler.step().await.unwrap();
        fired.push((run.job_id.to_string(), run.finished_at));
    }

    assert_eq!(
        fired,
        vec![
            ("A".to_string(), t0()),
            ("B".to_string(), t0()),
            ("C".to_string(), t0()),
            ("A".to_string(), t0() + Duration::minutes(2)),
        ]
    );
    assert_eq!(clock.sleeps(), 1);
    assert_eq!(sink.len(), 4);
    assert!(sink.lines()[1].ends_with(" - Task B executed successfully, output: b"));
}

#[tokio::test]
async fn test_restart_resumes_from_file_records() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(MemorySink::new());

    {
        let store = Arc::new(FileLastRunStore::new(dir.path()));
        let clock = Arc::new(ManualClock::new(t0()));
        let mut scheduler = Scheduler::new(store.clone(), clock);
        scheduler
            .register(echo_job("report", Interval::minutes(2).unwrap(), "done", sink.clone()))
            .unwrap();

        scheduler.step().await.unwrap();
        assert!(store.record_path(&"report".into()).exists());
    }

    let store = Arc::new(FileLastRunStore::new(dir.path()));
    let clock = Arc::new(ManualClock::new(t0() + Duration::minutes(1)));
    let mut scheduler = Scheduler::new(store, clock.clone());
    scheduler
        .register(echo_job("report", Interval::minutes(2).unwrap(), "done", sink.clone()))
        .unwrap();

    assert_eq!(scheduler.recover().await, 1);
    let (_, due) = scheduler.next_due(clock.now()).unwrap();
    assert_eq!(due, t0() + Duration::minutes(2));

    let run = scheduler.step().await.unwrap();
    assert_eq!(run.due_at, t0() + Duration::minutes(2));
    assert_eq!(sink.len(), 2);
}

#[tokio::test]
async fn test_missed_cycles_run_once_on_restart() {
    let store = Arc::new(InMemoryLastRunStore::with_entries([(
        JobId::new("sync"),
        t0() - Duration::hours(20),
    )]));
    let clock = Arc::new(ManualClock::new(t0()));
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = Scheduler::new(store, clock.clone());
    scheduler
        .register(echo_job("sync", Interval::hours(6).unwrap(), "ok", sink.clone()))
        .unwrap();
    scheduler.recover().await;

    let run = scheduler.step().await.unwrap();

    // 20h behind on a 6h grid: next grid point is 4h ahead, no burst of runs.
    assert_eq!(run.due_at, t0() + Duration::hours(4));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_failure_is_logged_and_schedule_advances() {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(InMemoryLastRunStore::new());
    let sink = Arc::new(MemorySink::new());
    let unit = FlakyUnit::new("flaky", 1, "recovered").with_error("disk full");
    let job = Job::new(
        "flaky",
        Arc::new(unit),
        Interval::minutes(5).unwrap(),
        sink.clone() as Arc<dyn OutputSink>,
    );
    let mut scheduler = Scheduler::new(store.clone(), clock.clone());
    scheduler.register(job).unwrap();

    let first = scheduler.step().await.unwrap();
    let second = scheduler.step().await.unwrap();

    assert!(!first.outcome.is_success());
    assert!(second.outcome.is_success());
    assert_eq!(second.due_at, t0() + Duration::minutes(5));
    let lines = sink.lines();
    assert!(lines[0].contains("Task flaky execution failed"));
    assert!(lines[0].contains("disk full"));
    assert!(lines[1].ends_with("output: recovered"));
    assert_eq!(
        store.load_last_run(&"flaky".into()).await.unwrap(),
        Some(t0() + Duration::minutes(5))
    );
}

#[tokio::test]
async fn test_unreadable_store_runs_jobs_immediately() {
    let store = Arc::new(FailingStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let sink = Arc::new(MemorySink::new());
    let mut scheduler = Scheduler::new(store.clone(), clock.clone());
    scheduler
        .register(echo_job("nightly", Interval::days(1).unwrap(), "ran", sink.clone()))
        .unwrap();

    assert_eq!(scheduler.recover().await, 0);
    let run = scheduler.step().await.unwrap();

    assert_eq!(run.due_at, t0());
    assert_eq!(clock.sleeps(), 0);
    assert_eq!(store.save_attempts(), 1);
    // The in-memory schedule still advances.
    assert_eq!(scheduler.jobs()[0].last_run(), Some(t0()));
}
