//! Adaptive concurrent batch dispatch.
//!
//! A [`Dispatcher`] runs batches of independent [`WorkItem`]s through an
//! [`ItemProcessor`] on a long-lived [`WorkerPool`], choosing how many workers
//! to use from the reading of a [`LoadProbe`].

mod dispatcher;
mod load;
mod pool;

pub use dispatcher::{
    DEFAULT_LOAD_CEILING, DEFAULT_SMALL_THRESHOLD, DEFAULT_WAIT_TIMEOUT, DispatchOutcome,
    Dispatcher, DispatcherConfig, ItemProcessor, UnitProcessor, Uppercase, WorkItem, partition,
};
pub use load::{DEFAULT_LOAD, FixedLoad, LoadProbe, SystemLoad, available_cores};
pub use pool::{PoolError, PoolTask, WorkerPool};
