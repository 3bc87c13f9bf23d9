//! File-backed output sink.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{OutputSink, SinkError};

/// Appends lines to a file, flushing after every line.
///
/// Several jobs may share one `FileSink`; the internal mutex keeps their
/// lines from interleaving.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    /// Open (or create) `path` in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let mut file = self.file.lock().map_err(|_| SinkError::LockPoisoned)?;
        // One write call per line keeps O_APPEND writes whole.
        file.write_all(buf.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
