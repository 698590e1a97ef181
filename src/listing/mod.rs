//! Listing extraction
//!
//! Parses the listing blocks of a book chapter into typed steps and keeps
//! track of which steps a scenario has exercised.

mod chapter;
pub mod parser;
mod step;

pub use chapter::{Chapter, StepRef};
pub use step::{Action, Step, StepId, StepKind, StepStatus};
