//! In-memory storage implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use super::{LastRunStore, StorageError};
use crate::core::types::JobId;

/// In-memory storage backend.
///
/// Thread-safe storage using RwLock for concurrent access.
/// Data is not persisted across restarts.
#[derive(Debug, Default)]
pub struct InMemoryLastRunStore {
    last_runs: RwLock<HashMap<JobId, DateTime<Utc>>>,
}

impl InMemoryLastRunStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with last run times.
    pub fn with_entries(entries: impl IntoIterator<Item = (JobId, DateTime<Utc>)>) -> Self {
        Self {
            last_runs: RwLock::new(entries.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LastRunStore for InMemoryLastRunStore {
    async fn load_last_run(&self, job: &JobId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let last_runs = self
            .last_runs
            .read()
            .map_err(|_| StorageError::LockPoisoned)?;
        Ok(last_runs.get(job).copied())
    }

    async fn save_last_run(&self, job: &JobId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut last_runs = self
            .last_runs
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;
        last_runs.insert(job.clone(), at);
        Ok(())
    }
}
