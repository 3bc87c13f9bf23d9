//! Persistence of per-job last-run timestamps.
//!
//! This module provides a trait-based storage abstraction with pluggable
//! backends (one file per job, in-memory).

mod file;
mod memory;

pub use file::FileLastRunStore;
pub use memory::InMemoryLastRunStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::types::JobId;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the record failed.
    #[error("storage I/O error for job {job}: {source}")]
    Io {
        job: JobId,
        #[source]
        source: std::io::Error,
    },

    /// The stored record could not be parsed as a timestamp.
    #[error("corrupt last-run record for job {job}: {value:?}")]
    Corrupt { job: JobId, value: String },

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Durable record of when each job last ran.
#[async_trait]
pub trait LastRunStore: Send + Sync {
    /// Load the last run time of a job. `Ok(None)` means the job never ran.
    async fn load_last_run(&self, job: &JobId) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Persist the last run time of a job, replacing any previous value.
    async fn save_last_run(&self, job: &JobId, at: DateTime<Utc>) -> Result<(), StorageError>;
}
