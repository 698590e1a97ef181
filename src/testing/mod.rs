//! Chapter scenario runner
//!
//! Reads a YAML scenario describing how a chapter's steps are replayed and
//! drives the execution and comparison engines through it.

mod config;
mod runner;

pub use config::*;
pub use runner::{load_scenario, run_scenario, write_listing, RunOptions, ScenarioRun, TestResult};
