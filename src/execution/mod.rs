//! Work unit implementations.
//!
//! This module provides the concrete actions jobs and dispatched items run:
//! external commands and in-process callbacks.

mod callback;
mod command;

pub use callback::FnUnit;
pub use command::{CommandUnit, CommandUnitBuilder};
