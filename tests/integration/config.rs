//! From a YAML file to jobs writing real output.

use crate::common::{t0, write_config};
use cadence::testing::ManualClock;
use cadence::{FileLastRunStore, JobConfigBuilder, Scheduler, YamlLoader};
use std::sync::Arc;

#[tokio::test]
async fn test_config_file_drives_command_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    let log = dir.path().join("task_log.txt");
    let path = write_config(
        dir.path(),
        &format!(
            r#"
state_dir: {state}
output: {log}
jobs:
  - name: greet
    command: echo
    args: ["hello", "there"]
    interval: {{ unit: minute, every: 2 }}
  - name: broken
    command: echo
    interval: {{ unit: week, every: 1 }}
"#,
            state = state.display(),
            log = log.display(),
        ),
    );

    let config = YamlLoader::load_config(&path).unwrap();
    let built = JobConfigBuilder::build_all(&config);
    assert_eq!(built.jobs.len(), 1);
    assert_eq!(built.rejected.len(), 1);
    assert_eq!(built.rejected[0].name, "broken");

    let store = Arc::new(FileLastRunStore::new(&config.state_dir));
    let mut scheduler = Scheduler::new(store.clone(), Arc::new(ManualClock::new(t0())));
    for job in built.jobs {
        scheduler.register(job).unwrap();
    }
    scheduler.recover().await;

    let run = scheduler.step().await.unwrap();

    assert!(run.outcome.is_success());
    let written = std::fs::read_to_string(&log).unwrap();
    assert!(written.contains("Task greet executed successfully, output: hello there"));
    let record = std::fs::read_to_string(store.record_path(&"greet".into())).unwrap();
    assert!(record.starts_with("2024-05-06 09:00:00"));
}

#[tokio::test]
async fn test_failing_command_writes_failure_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("failures.log");
    let path = write_config(
        dir.path(),
        &format!(
            r#"
state_dir: {state}
jobs:
  - name: doomed
    command: sh
    args: ["-c", "echo boom >&2; exit 3"]
    interval: {{ unit: hour, every: 1 }}
    output: {log}
"#,
            state = dir.path().display(),
            log = log.display(),
        ),
    );

    let config = YamlLoader::load_config(&path).unwrap();
    let built = JobConfigBuilder::build_all(&config);
    let mut scheduler = Scheduler::new(
        Arc::new(FileLastRunStore::new(&config.state_dir)),
        Arc::new(ManualClock::new(t0())),
    );
    for job in built.jobs {
        scheduler.register(job).unwrap();
    }

    let run = scheduler.step().await.unwrap();

    assert!(!run.outcome.is_success());
    let written = std::fs::read_to_string(&log).unwrap();
    assert_eq!(written.lines().count(), 1);
    assert!(written.contains("Task doomed execution failed: command exited with code 3: boom"));
}
