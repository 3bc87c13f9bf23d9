//! Integration tests for the cadence scheduler and dispatcher.
//!
//! These tests verify end-to-end scenarios including:
//! - Interleaving jobs with different intervals
//! - Resuming a schedule from persisted last-run records
//! - Loading a YAML configuration and running its commands
//! - Batch dispatch with retries

mod common;

mod integration {
    pub mod config;
    pub mod dispatcher;
    pub mod scheduler;
}
