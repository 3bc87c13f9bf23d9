//! cadence - a recurring job scheduler with adaptive concurrent dispatch.
//!
//! Two services live here:
//!
//! - [`Scheduler`] keeps a set of named jobs, each repeating on a fixed
//!   [`Interval`], and always runs the one due soonest. Last run times are
//!   persisted through a [`LastRunStore`] so restarts resume the schedule.
//! - [`Dispatcher`] runs a batch of independent [`WorkItem`]s, spreading it
//!   over one or two workers depending on system load, with per-item retry.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod execution;
pub mod scheduler;
pub mod sink;
pub mod storage;
pub mod testing;

pub use config::{BuiltJobs, ConfigError, JobConfigBuilder, SchedulerConfig, YamlLoader};
pub use core::clock::{Clock, SystemClock};
pub use core::interval::{Interval, IntervalError, IntervalUnit};
pub use core::job::{Job, next_run_time};
pub use core::retry::{RetryCondition, RetryPolicy};
pub use core::types::{ItemId, JobId};
pub use core::unit::{WorkError, WorkOutput, WorkUnit};
pub use dispatch::{
    DispatchOutcome, Dispatcher, DispatcherConfig, FixedLoad, ItemProcessor, LoadProbe,
    SystemLoad, UnitProcessor, Uppercase, WorkItem, WorkerPool,
};
pub use execution::{CommandUnit, CommandUnitBuilder, FnUnit};
pub use scheduler::{JobRun, RunOutcome, Scheduler, SchedulerError, Upcoming};
pub use sink::{FileSink, MemorySink, OutputSink, SinkError};
pub use storage::{FileLastRunStore, InMemoryLastRunStore, LastRunStore, StorageError};
