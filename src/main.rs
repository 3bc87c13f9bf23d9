//! cadence - a recurring job scheduler.
//!
//! Usage:
//!   cadence run <config>       Run the scheduler with jobs from the configuration file
//!   cadence validate <config>  Validate the configuration without running
//!   cadence list <config>      List jobs with their last and next run (--json for JSON)
//!   cadence next <config>      Show which job fires next
//!   cadence dispatch <item>... Upper-case items through the batch dispatcher

use cadence::config::{BuiltJobs, SchedulerConfig};
use cadence::scheduler::format_instant;
use cadence::{
    Dispatcher, FileLastRunStore, FixedLoad, ItemProcessor, JobConfigBuilder, LoadProbe,
    MemorySink, OutputSink, Scheduler, SystemLoad, Uppercase, WorkItem, YamlLoader,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// cadence - a recurring job scheduler with adaptive batch dispatch
#[derive(Parser)]
#[command(name = "cadence")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted
    Run {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Directory for last-run records (overrides the configuration)
        #[arg(long, env = "CADENCE_STATE_DIR")]
        state_dir: Option<PathBuf>,

        /// Run only the next due job, then exit
        #[arg(long)]
        once: bool,
    },

    /// Validate the configuration without running
    Validate {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },

    /// List jobs with their last and next run
    List {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,

        /// Directory for last-run records (overrides the configuration)
        #[arg(long, env = "CADENCE_STATE_DIR")]
        state_dir: Option<PathBuf>,
    },

    /// Show which job fires next and when
    Next {
        /// Path to the YAML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Directory for last-run records (overrides the configuration)
        #[arg(long, env = "CADENCE_STATE_DIR")]
        state_dir: Option<PathBuf>,
    },

    /// Upper-case items through the dispatcher and print the results
    Dispatch {
        /// Retry failed items per the retry policy
        #[arg(long)]
        retry: bool,

        /// Use a fixed load reading instead of the system load average
        #[arg(long)]
        load: Option<f64>,

        /// Take dispatcher settings from this configuration file
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Items to process
        #[arg(value_name = "ITEM", required = true)]
        items: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            state_dir,
            once,
        } => {
            run_scheduler(config, state_dir, once).await?;
        }
        Commands::Validate { config } => {
            validate_config(config)?;
        }
        Commands::List {
            config,
            json,
            state_dir,
        } => {
            list_jobs(config, state_dir, json).await?;
        }
        Commands::Next { config, state_dir } => {
            next_job(config, state_dir).await?;
        }
        Commands::Dispatch {
            retry,
            load,
            config,
            items,
        } => {
            dispatch_items(retry, load, config, items).await?;
        }
    }

    Ok(())
}

/// Build a scheduler from the runnable jobs in `built`.
fn scheduler_for(
    config: &SchedulerConfig,
    state_dir: Option<PathBuf>,
    built: BuiltJobs,
) -> Result<Scheduler, Box<dyn std::error::Error>> {
    let state_dir = state_dir.unwrap_or_else(|| config.state_dir.clone());
    let store = Arc::new(FileLastRunStore::new(state_dir));
    let mut scheduler = Scheduler::with_system_clock(store);
    for job in built.jobs {
        scheduler.register(job)?;
    }
    Ok(scheduler)
}

/// Load a configuration and build its jobs with throwaway sinks, for
/// commands that only inspect the schedule.
fn load_for_inspection(
    path: &Path,
) -> Result<(SchedulerConfig, BuiltJobs), Box<dyn std::error::Error>> {
    let config = YamlLoader::load_config(path)?;
    let built = JobConfigBuilder::build_all_with(&config, |_| {
        Ok(Arc::new(MemorySink::new()) as Arc<dyn OutputSink>)
    });
    Ok((config, built))
}

/// Run the scheduler until Ctrl+C (or for one job with `once`).
async fn run_scheduler(
    config_path: PathBuf,
    state_dir: Option<PathBuf>,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading configuration from: {}", config_path.display());

    let config = YamlLoader::load_config(&config_path)?;
    let built = JobConfigBuilder::build_all(&config);

    if !built.rejected.is_empty() {
        warn!("{} job(s) skipped because of configuration errors", built.rejected.len());
    }
    if built.jobs.is_empty() {
        return Err("no runnable jobs in configuration".into());
    }

    info!("Loaded {} job(s):", built.jobs.len());
    for job in &built.jobs {
        info!("  - {} ({})", job.id(), job.interval());
    }

    let mut scheduler = scheduler_for(&config, state_dir, built)?;

    if once {
        scheduler.recover().await;
        let run = scheduler.step().await?;
        info!(
            "Job '{}' ran at {} ({})",
            run.job_id,
            format_instant(run.finished_at),
            if run.outcome.is_success() { "success" } else { "failed" }
        );
        return Ok(());
    }

    info!("Press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
        result = scheduler.run() => {
            result?;
        }
    }

    info!("Goodbye!");
    Ok(())
}

/// Validate the configuration without running.
fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating configuration: {}", config_path.display());

    let (_, built) = load_for_inspection(&config_path)?;

    for rejected in &built.rejected {
        error!("  - {}: {}", rejected.name, rejected.error);
    }
    for name in &built.disabled {
        info!("  - {}: OK (disabled)", name);
    }
    for job in &built.jobs {
        info!("  - {}: OK ({})", job.id(), job.interval());
    }

    if built.is_clean() {
        info!("All {} job(s) are valid", built.jobs.len() + built.disabled.len());
        Ok(())
    } else {
        Err(format!("{} invalid job(s)", built.rejected.len()).into())
    }
}

/// List all jobs with their last and next run.
async fn list_jobs(
    config_path: PathBuf,
    state_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, built) = load_for_inspection(&config_path)?;
    let mut scheduler = scheduler_for(&config, state_dir, built)?;
    scheduler.recover().await;

    if json {
        let upcoming = scheduler.upcoming(Utc::now());
        println!("{}", serde_json::to_string_pretty(&upcoming)?);
        return Ok(());
    }

    if scheduler.jobs().is_empty() {
        println!("No jobs found in {}", config_path.display());
        return Ok(());
    }

    println!("Jobs in {}:", config_path.display());
    println!();

    for (job, upcoming) in scheduler.jobs().iter().zip(scheduler.upcoming(Utc::now())) {
        println!("ID: {}", job.id());
        println!("  Unit: {}", job.unit().name());
        println!("  Interval: {}", job.interval());
        println!(
            "  Last run: {}",
            upcoming
                .last_run
                .map(format_instant)
                .unwrap_or_else(|| "never".to_string())
        );
        println!("  Next run: {}", format_instant(upcoming.next_run));
        println!();
    }

    Ok(())
}

/// Show which job fires next.
async fn next_job(
    config_path: PathBuf,
    state_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, built) = load_for_inspection(&config_path)?;
    let mut scheduler = scheduler_for(&config, state_dir, built)?;
    scheduler.recover().await;

    match scheduler.next_due(Utc::now()) {
        Some((index, due)) => {
            println!("{} at {}", scheduler.jobs()[index].id(), format_instant(due));
            Ok(())
        }
        None => Err("no runnable jobs in configuration".into()),
    }
}

/// Run the reference upper-case processor over `items`.
async fn dispatch_items(
    retry: bool,
    load: Option<f64>,
    config_path: Option<PathBuf>,
    items: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = match config_path {
        Some(path) => YamlLoader::load_config(path)?.dispatcher,
        None => SchedulerConfig::default().dispatcher,
    };
    let probe: Arc<dyn LoadProbe> = match load {
        Some(value) => Arc::new(FixedLoad(value)),
        None => Arc::new(SystemLoad::new()),
    };

    let dispatcher = Dispatcher::new(settings.to_dispatcher_config(), probe);
    let processor: Arc<dyn ItemProcessor<String, String>> = Arc::new(Uppercase);
    let items = WorkItem::batch(items);
    let outcome = if retry {
        dispatcher
            .dispatch_with_retry_detailed(processor, items)
            .await
    } else {
        dispatcher.dispatch_detailed(processor, items).await
    };

    info!(
        "Dispatched over {} worker(s), chunks {:?}",
        outcome.workers, outcome.chunk_sizes
    );
    if !outcome.abandoned.is_empty() {
        warn!("{} item(s) abandoned", outcome.abandoned.len());
    }
    for output in &outcome.outputs {
        println!("{output}");
    }

    dispatcher.shutdown().await;
    Ok(())
}
