//! Execution engine
//!
//! Runs chapter commands against a real shell and guarantees that every
//! process group they started is terminated when the scenario ends.

mod group;
mod runner;

pub use group::{ProcessGroup, ProcessGroups};
pub use runner::{RunOutcome, ShellRunner};
