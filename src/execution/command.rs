//! External command work unit.
//!
//! [`CommandUnit`] wraps shell commands and external executables so they can
//! be scheduled as recurring jobs. Use the builder to set arguments,
//! environment variables, a working directory and a timeout.
//!
//! ```rust
//! use cadence::CommandUnit;
//! use std::time::Duration;
//!
//! let unit = CommandUnit::builder("python")
//!     .name("nightly_report")
//!     .args(["-m", "reports.nightly"])
//!     .env("LOG_LEVEL", "info")
//!     .timeout(Duration::from_secs(600))
//!     .build();
//! assert_eq!(unit.program(), "python");
//! ```
//!
//! # Error Handling
//!
//! - **Non-zero exit code**: [`WorkError::CommandFailed`] with the exit code
//!   and stderr
//! - **Timeout**: [`WorkError::Timeout`]; the child is killed when the command
//!   future is dropped
//! - **Spawn failure**: [`WorkError::ExecutionFailed`] (e.g., program not found)

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::unit::{WorkError, WorkOutput, WorkUnit};

/// A work unit that executes an external command.
#[derive(Debug, Clone)]
pub struct CommandUnit {
    /// Unit name (used for identification)
    name: String,
    /// Program to execute
    program: String,
    /// Command arguments
    args: Vec<String>,
    /// Environment variables
    env: BTreeMap<String, String>,
    /// Working directory
    working_dir: Option<PathBuf>,
    /// Execution timeout
    timeout: Option<Duration>,
}

impl CommandUnit {
    /// Create a new builder for a command unit.
    pub fn builder(program: impl Into<String>) -> CommandUnitBuilder {
        CommandUnitBuilder::new(program)
    }

    /// Get the program being executed.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the command arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Get the environment variables passed to the child.
    pub fn env_vars(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Get the timeout duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl WorkUnit for CommandUnit {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<WorkOutput, WorkError> {
        let started = Instant::now();
        let mut cmd = self.command();

        let output = match self.timeout {
            Some(duration) => timeout(duration, cmd.output())
                .await
                .map_err(|_| WorkError::Timeout(duration))?
                .map_err(|e| WorkError::ExecutionFailed(e.to_string()))?,
            None => cmd
                .output()
                .await
                .map_err(|e| WorkError::ExecutionFailed(e.to_string()))?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            // Killed by a signal: no exit code.
            let code = output.status.code().unwrap_or(-1);
            return Err(WorkError::CommandFailed {
                code,
                stderr: stderr.trim_end().to_string(),
            });
        }

        Ok(WorkOutput {
            stdout,
            stderr,
            exit_code: output.status.code(),
            elapsed: started.elapsed(),
        })
    }
}

/// Builder for creating `CommandUnit` instances.
#[derive(Debug, Clone)]
pub struct CommandUnitBuilder {
    name: Option<String>,
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandUnitBuilder {
    /// Create a new builder with the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            name: None,
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Set the unit name. Defaults to the program.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add a single environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add several environment variables. Later values win.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Build the `CommandUnit`.
    pub fn build(self) -> CommandUnit {
        let name = self.name.unwrap_or_else(|| self.program.clone());
        CommandUnit {
            name,
            program: self.program,
            args: self.args,
            env: self.env,
            working_dir: self.working_dir,
            timeout: self.timeout,
        }
    }
}
