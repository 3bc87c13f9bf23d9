//! Common test utilities shared across integration tests.

use cadence::{FnUnit, Interval, Job, MemorySink, OutputSink};
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed starting instant for clock-driven tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

/// A job that prints `text` on every run, writing to `sink`.
pub fn echo_job(name: &str, interval: Interval, text: &str, sink: Arc<MemorySink>) -> Job {
    let text = text.to_string();
    let unit = FnUnit::new(name, move || Ok(text.clone()));
    Job::new(name, Arc::new(unit), interval, sink as Arc<dyn OutputSink>)
}

/// Write a configuration file into `dir` and return its path.
pub fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("cadence.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}
