//! One-file-per-job storage.
//!
//! Each job's last run time lives in `<dir>/<job>_last_run.txt` as a single
//! line `YYYY-MM-DD HH:MM:SS.ffffff` (UTC). Writes go to a temporary file
//! that is then renamed over the record, so a crash mid-write never leaves a
//! truncated timestamp behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{LastRunStore, StorageError};
use crate::core::types::JobId;

/// Timestamp format of a last-run record.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// File-based last-run storage.
#[derive(Debug, Clone)]
pub struct FileLastRunStore {
    dir: PathBuf,
}

impl FileLastRunStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `job`.
    pub fn record_path(&self, job: &JobId) -> PathBuf {
        self.dir.join(format!("{}_last_run.txt", job.as_str()))
    }

    fn io_error(job: &JobId, source: std::io::Error) -> StorageError {
        StorageError::Io {
            job: job.clone(),
            source,
        }
    }
}

#[async_trait]
impl LastRunStore for FileLastRunStore {
    async fn load_last_run(&self, job: &JobId) -> Result<Option<DateTime<Utc>>, StorageError> {
        let content = match tokio::fs::read_to_string(self.record_path(job)).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(job, e)),
        };

        let value = content.trim();
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
            .map(|naive| Some(naive.and_utc()))
            .map_err(|_| StorageError::Corrupt {
                job: job.clone(),
                value: value.to_string(),
            })
    }

    async fn save_last_run(&self, job: &JobId, at: DateTime<Utc>) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Self::io_error(job, e))?;

        let path = self.record_path(job);
        let tmp = path.with_extension("txt.tmp");
        let record = at.format(TIMESTAMP_FORMAT).to_string();

        tokio::fs::write(&tmp, record.as_bytes())
            .await
            .map_err(|e| Self::io_error(job, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Self::io_error(job, e))?;
        Ok(())
    }
}
