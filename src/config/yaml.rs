//! YAML configuration parsing.
//!
//! Parses the scheduler configuration file and validates its parts. File
//! level problems (unreadable file, malformed YAML, bad dispatcher settings)
//! fail the whole load; problems inside one job are reported by
//! [`YamlLoader::validate_job`] so the caller can skip just that job.

use std::path::Path;

use super::error::ConfigError;
use super::types::{DispatcherSettings, JobConfig, SchedulerConfig};
use crate::core::interval::Interval;

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load the scheduler configuration from a file.
    pub fn load_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        match Self::parse_config(&content) {
            Err(ConfigError::YamlError(source)) => Err(ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source,
            }),
            other => other,
        }
    }

    /// Parse the scheduler configuration from a YAML string.
    pub fn parse_config(yaml: &str) -> Result<SchedulerConfig, ConfigError> {
        let config: SchedulerConfig = serde_yaml::from_str(yaml)?;
        Self::validate_dispatcher(&config.dispatcher)?;
        Ok(config)
    }

    /// Validate dispatcher settings.
    fn validate_dispatcher(settings: &DispatcherSettings) -> Result<(), ConfigError> {
        if !settings.load_ceiling.is_finite() || settings.load_ceiling <= 0.0 {
            return Err(ConfigError::InvalidConfig(format!(
                "dispatcher load_ceiling must be a positive number, got {}",
                settings.load_ceiling
            )));
        }
        if settings.max_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "dispatcher max_attempts cannot be zero".into(),
            ));
        }
        if settings.wait_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "dispatcher wait_timeout_secs cannot be zero".into(),
            ));
        }
        if settings.pool_size == Some(0) {
            return Err(ConfigError::InvalidConfig(
                "dispatcher pool_size cannot be zero".into(),
            ));
        }
        Ok(())
    }

    /// Validate one job and return its parsed interval.
    pub fn validate_job(job: &JobConfig) -> Result<Interval, ConfigError> {
        let name = job.name.trim();
        if name.is_empty() {
            return Err(ConfigError::MissingField("name".into()));
        }

        // The name becomes part of the last-run file name.
        if name != job.name
            || name == "."
            || name == ".."
            || name.chars().any(|c| matches!(c, '/' | '\\' | '\0'))
        {
            return Err(ConfigError::InvalidConfig(format!(
                "job name '{}' cannot be used as a file name",
                job.name
            )));
        }

        match job.command.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(ConfigError::MissingField(format!("{name}.command")));
            }
            Some(_) => {}
        }

        if job.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidConfig(format!(
                "job '{name}': timeout_secs cannot be zero"
            )));
        }

        let interval = job
            .interval
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField(format!("{name}.interval")))?;
        Interval::parse(&interval.unit, interval.every).map_err(|source| {
            ConfigError::InvalidInterval {
                job: name.to_string(),
                source,
            }
        })
    }
}
