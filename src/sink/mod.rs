//! Append-only output destinations for job runs.
//!
//! Each execution attempt of a scheduled job writes one line per line of
//! captured output, or a single failure line, to the job's sink.

mod file;
mod memory;

pub use file::FileSink;
pub use memory::MemorySink;

use thiserror::Error;

/// Errors that can occur when appending to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying I/O failure.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Sink lock was poisoned.
    #[error("sink lock poisoned")]
    LockPoisoned,
}

/// A destination that accepts whole lines.
///
/// Implementations must make each `append_line` call atomic: a line is either
/// fully written or not at all, and lines from concurrent callers never
/// interleave.
pub trait OutputSink: Send + Sync {
    /// Append a single line. A trailing newline is added by the sink.
    fn append_line(&self, line: &str) -> Result<(), SinkError>;
}
