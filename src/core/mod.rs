//! Core building blocks: identifiers, intervals, clocks, jobs, work units,
//! and retry policies.

pub mod clock;
pub mod interval;
pub mod job;
pub mod retry;
pub mod types;
pub mod unit;
