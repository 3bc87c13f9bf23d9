//! Configuration type definitions.
//!
//! Serde types mirroring the YAML configuration file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::retry::RetryPolicy;
use crate::dispatch::{
    DEFAULT_LOAD_CEILING, DEFAULT_SMALL_THRESHOLD, DEFAULT_WAIT_TIMEOUT, DispatcherConfig,
};

/// Default directory for last-run records.
pub const DEFAULT_STATE_DIR: &str = ".";

/// Default output file shared by jobs without their own.
pub const DEFAULT_OUTPUT: &str = "task_log.txt";

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Directory holding `<job>_last_run.txt` records.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Output file for jobs that do not set their own.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Environment variables passed to every job. Job values win.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Dispatcher tuning.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    /// Job definitions, in tie-break order.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            output: default_output(),
            environment: HashMap::new(),
            dispatcher: DispatcherSettings::default(),
            jobs: Vec::new(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_true() -> bool {
    true
}

/// Job configuration from YAML.
///
/// Required fields are optional here so a job missing one is reported and
/// skipped on its own instead of failing the whole file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    /// Unique job name.
    #[serde(default)]
    pub name: String,
    /// Program to run.
    pub command: Option<String>,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Recurrence interval.
    pub interval: Option<IntervalConfig>,
    /// Output file, defaults to the global one.
    pub output: Option<PathBuf>,
    /// Working directory for the command.
    pub working_dir: Option<PathBuf>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Environment variables for this job.
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Whether the job is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Interval as written in YAML: `{ unit: hour, every: 6 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Unit name (second, minute, hour, day, month, year).
    pub unit: String,
    /// Number of units between runs.
    pub every: i64,
}

/// Dispatcher settings from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Batches with fewer items run item by item.
    pub small_threshold: usize,
    /// Two workers are used only while load is below this value.
    pub load_ceiling: f64,
    /// Attempts per item, including the first.
    pub max_attempts: u32,
    /// Pause between attempts in milliseconds.
    pub retry_delay_ms: u64,
    /// Bound on how long one dispatch call waits, in seconds.
    pub wait_timeout_secs: u64,
    /// Pool workers; defaults to the available cores.
    pub pool_size: Option<usize>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            small_threshold: DEFAULT_SMALL_THRESHOLD,
            load_ceiling: DEFAULT_LOAD_CEILING,
            max_attempts: retry.max_attempts,
            retry_delay_ms: retry.delay.as_millis() as u64,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT.as_secs(),
            pool_size: None,
        }
    }
}

impl DispatcherSettings {
    /// Convert into runtime dispatcher configuration.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let mut config = DispatcherConfig {
            small_threshold: self.small_threshold,
            load_ceiling: self.load_ceiling,
            ..DispatcherConfig::default()
        }
        .with_retry(RetryPolicy::fixed(
            self.max_attempts,
            Duration::from_millis(self.retry_delay_ms),
        ))
        .with_wait_timeout(Duration::from_secs(self.wait_timeout_secs));
        if let Some(size) = self.pool_size {
            config = config.with_pool_size(size);
        }
        config
    }
}
