//! Scheduler engine for recurring jobs.
//!
//! This module provides the main scheduling loop that always runs the job
//! whose next run is soonest, and restores last run times on startup.

mod engine;
mod types;

pub use engine::{SINK_TIMESTAMP_FORMAT, Scheduler, format_instant};
pub use types::{JobRun, RunOutcome, SchedulerError, Upcoming};
