//! Job builder from YAML configuration.
//!
//! This module converts [`SchedulerConfig`] into runnable [`Job`]s. Each job
//! is validated on its own: a bad job is logged and skipped, the rest load.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::ConfigError;
use super::types::{JobConfig, SchedulerConfig};
use super::yaml::YamlLoader;
use crate::core::job::Job;
use crate::execution::CommandUnit;
use crate::sink::{FileSink, OutputSink, SinkError};

/// A job that could not be built, with the reason.
#[derive(Debug)]
pub struct RejectedJob {
    /// Name as written in the configuration (may be empty).
    pub name: String,
    /// Why the job was rejected.
    pub error: ConfigError,
}

/// Result of building every job in a configuration.
#[derive(Debug, Default)]
pub struct BuiltJobs {
    /// Runnable jobs, in configuration order.
    pub jobs: Vec<Job>,
    /// Jobs excluded because of configuration errors.
    pub rejected: Vec<RejectedJob>,
    /// Names of valid jobs switched off with `enabled: false`.
    pub disabled: Vec<String>,
}

impl BuiltJobs {
    /// Check if every configured job was built or deliberately disabled.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Builder for creating Jobs from YAML configuration.
pub struct JobConfigBuilder;

impl JobConfigBuilder {
    /// Build all jobs, writing output to files. Jobs naming the same output
    /// path share one sink.
    pub fn build_all(config: &SchedulerConfig) -> BuiltJobs {
        let mut sinks: HashMap<PathBuf, Arc<FileSink>> = HashMap::new();
        Self::build_all_with(config, |path| {
            if let Some(sink) = sinks.get(path) {
                return Ok(Arc::clone(sink) as Arc<dyn OutputSink>);
            }
            let sink = Arc::new(FileSink::open(path)?);
            sinks.insert(path.to_path_buf(), Arc::clone(&sink));
            Ok(sink as Arc<dyn OutputSink>)
        })
    }

    /// Build all jobs, obtaining each job's sink from `open_sink`.
    pub fn build_all_with<F>(config: &SchedulerConfig, mut open_sink: F) -> BuiltJobs
    where
        F: FnMut(&Path) -> Result<Arc<dyn OutputSink>, SinkError>,
    {
        let mut built = BuiltJobs::default();
        let mut seen: HashSet<&str> = HashSet::new();

        for job_config in &config.jobs {
            let result = if !seen.insert(job_config.name.as_str()) {
                Err(ConfigError::InvalidConfig(format!(
                    "duplicate job name: {}",
                    job_config.name
                )))
            } else if !job_config.enabled {
                YamlLoader::validate_job(job_config).map(|_| None)
            } else {
                Self::build_job(job_config, config, &mut open_sink).map(Some)
            };

            match result {
                Ok(Some(job)) => built.jobs.push(job),
                Ok(None) => {
                    tracing::info!(job_id = %job_config.name, "Job disabled, skipping");
                    built.disabled.push(job_config.name.clone());
                }
                Err(error) => {
                    tracing::error!(
                        job_id = %job_config.name,
                        error = %error,
                        "Invalid job configuration, skipping"
                    );
                    built.rejected.push(RejectedJob {
                        name: job_config.name.clone(),
                        error,
                    });
                }
            }
        }
        built
    }

    /// Build one Job from its configuration.
    fn build_job<F>(
        job: &JobConfig,
        global: &SchedulerConfig,
        open_sink: &mut F,
    ) -> Result<Job, ConfigError>
    where
        F: FnMut(&Path) -> Result<Arc<dyn OutputSink>, SinkError>,
    {
        let interval = YamlLoader::validate_job(job)?;
        let unit = Self::build_unit(job, global)?;

        let output = job.output.as_deref().unwrap_or(&global.output);
        let sink = open_sink(output).map_err(|source| ConfigError::OutputError {
            path: output.to_path_buf(),
            source,
        })?;

        Ok(Job::new(job.name.as_str(), Arc::new(unit), interval, sink))
    }

    /// Build the command a job runs. Job environment overrides the global one.
    fn build_unit(job: &JobConfig, global: &SchedulerConfig) -> Result<CommandUnit, ConfigError> {
        let command = job
            .command
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField(format!("{}.command", job.name)))?;

        let mut builder = CommandUnit::builder(command)
            .name(&job.name)
            .args(&job.args)
            .envs(&global.environment)
            .envs(&job.environment);

        if let Some(dir) = &job.working_dir {
            builder = builder.working_dir(dir);
        }

        if let Some(secs) = job.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(builder.build())
    }
}
