//! In-memory output sink.

use std::sync::RwLock;

use super::{OutputSink, SinkError};

/// Collects lines in memory. Useful for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: RwLock<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.read().map(|l| l.clone()).unwrap_or_default()
    }

    /// Number of lines written so far.
    pub fn len(&self) -> usize {
        self.lines.read().map(|l| l.len()).unwrap_or(0)
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for MemorySink {
    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        self.lines
            .write()
            .map_err(|_| SinkError::LockPoisoned)?
            .push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_lines() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.append_line("hello").unwrap();
        sink.append_line("world").unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.lines(), vec!["hello", "world"]);
    }
}
