//! bookcheck - book manuscript verification
//!
//! Parses the listing blocks of an HTML-rendered book chapter into typed
//! steps and replays them in a temporary directory, comparing console
//! output with what the book shows.

pub mod cli;
pub mod commands;
pub mod common;
pub mod compare;
pub mod listing;
pub mod shell;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use listing::{Chapter, Step, StepId, StepKind, StepRef, StepStatus};
