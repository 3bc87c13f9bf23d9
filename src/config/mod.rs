//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for jobs and dispatcher
//! settings, and builds runnable jobs from it.

mod builder;
mod error;
mod types;
mod yaml;

pub use builder::{BuiltJobs, JobConfigBuilder, RejectedJob};
pub use error::ConfigError;
pub use types::{
    DEFAULT_OUTPUT, DEFAULT_STATE_DIR, DispatcherSettings, IntervalConfig, JobConfig,
    SchedulerConfig,
};
pub use yaml::YamlLoader;
