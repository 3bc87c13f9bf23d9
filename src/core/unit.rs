//! Work unit trait and error types.
//!
//! A `WorkUnit` is the opaque action a scheduled job executes: an external
//! command, a callback, or anything else that produces textual output.
//! Implement this trait to plug custom actions into the scheduler.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while running a work unit.
#[derive(Debug, Error)]
pub enum WorkError {
    /// Execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The work unit timed out.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// External command exited with a non-zero code.
    #[error("command exited with code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    /// A transient error that may succeed on retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl WorkError {
    /// Check if this error is considered transient (should trigger retry).
    pub fn is_transient(&self) -> bool {
        matches!(self, WorkError::Transient(_) | WorkError::Timeout(_))
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOutput {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Process exit code, if the unit was a process.
    pub exit_code: Option<i32>,
    /// Wall time the run took.
    pub elapsed: Duration,
}

impl WorkOutput {
    /// Output consisting only of stdout text.
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    /// Iterate over stdout lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// An executable action owned by the caller.
///
/// # Example
///
/// ```ignore
/// use cadence::{WorkError, WorkOutput, WorkUnit};
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl WorkUnit for Heartbeat {
///     fn name(&self) -> &str {
///         "heartbeat"
///     }
///
///     async fn run(&self) -> Result<WorkOutput, WorkError> {
///         Ok(WorkOutput::from_stdout("alive"))
///     }
/// }
/// ```
#[async_trait]
pub trait WorkUnit: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Run the action once and capture its output.
    ///
    /// # Returns
    /// * `Ok(WorkOutput)` - the action completed successfully
    /// * `Err(WorkError)` - the action failed or timed out
    async fn run(&self) -> Result<WorkOutput, WorkError>;

    /// Optional description for display/logging purposes.
    fn description(&self) -> Option<&str> {
        None
    }
}
