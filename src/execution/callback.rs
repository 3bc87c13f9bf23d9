//! Callback work unit.

use async_trait::async_trait;
use std::fmt;
use std::time::Instant;

use crate::core::unit::{WorkError, WorkOutput, WorkUnit};

type Callback = dyn Fn() -> Result<String, WorkError> + Send + Sync;

/// A work unit backed by an in-process closure returning its stdout text.
pub struct FnUnit {
    name: String,
    callback: Box<Callback>,
}

impl FnUnit {
    /// Wrap a closure as a named work unit.
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() -> Result<String, WorkError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for FnUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUnit").field("name", &self.name).finish()
    }
}

#[async_trait]
impl WorkUnit for FnUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<WorkOutput, WorkError> {
        let started = Instant::now();
        let stdout = (self.callback)()?;
        Ok(WorkOutput {
            stdout,
            elapsed: started.elapsed(),
            ..WorkOutput::default()
        })
    }
}
