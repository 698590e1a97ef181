//! Error types for bookcheck
//!
//! Failures name the instructional step that broke (index, id and content)
//! so the chapter script or the book can be fixed directly.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for bookcheck
#[derive(Error, Debug)]
pub enum Error {
    // === Parse Errors ===
    #[error("Listing {block} could not be parsed: {reason}")]
    Parse { block: String, reason: String },

    #[error("Chapter section {0} not found in book")]
    SectionNotFound(usize),

    // === Step Errors ===
    #[error("Step '{0}' does not exist in this chapter")]
    UnknownStep(String),

    #[error("Step {index} ({id}) is a {actual}, expected a {expected}")]
    WrongStepKind {
        index: usize,
        id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Step {index} ({id}) cannot be marked {action}")]
    InvalidTransition {
        index: usize,
        id: String,
        action: String,
    },

    // === Verification Errors ===
    #[error("Output {index} ({id}) does not match.\n--- expected ---\n{expected}\n--- actual ---\n{actual}")]
    Mismatch {
        index: usize,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Step {index} ({id}) was never exercised ({unsatisfied} unsatisfied in total):\n{content}")]
    IncompleteScenario {
        index: usize,
        id: String,
        content: String,
        unsatisfied: usize,
    },

    // === Process Errors ===
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("Command '{command}' timed out after {secs} seconds")]
    CommandTimeout { command: String, secs: u64 },

    #[error("Failed to terminate process group {pgid} ({command}): {reason}")]
    ProcessTermination {
        pgid: i32,
        command: String,
        reason: String,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a parse error for a listing block
    pub fn parse(block: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            block: block.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: &str, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a wrong step kind error
    pub fn wrong_kind(index: usize, id: &str, expected: &'static str, actual: &'static str) -> Self {
        Self::WrongStepKind {
            index,
            id: id.to_string(),
            expected,
            actual,
        }
    }
}
