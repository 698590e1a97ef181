//! Scenario configuration types
//!
//! Defines the data structures for deserializing YAML chapter scenarios.

use serde::Deserialize;
use std::path::PathBuf;

use crate::listing::StepRef;

/// A chapter scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the scenario
    pub name: String,
    /// Optional description of what the chapter builds
    pub description: Option<String>,
    /// HTML book, relative to the scenario file
    pub book: PathBuf,
    /// Zero-based index of the chapter's `div.sect1`
    #[serde(default = "default_section")]
    pub section: usize,
    /// Directory the chapter's project lives in, relative to the temp dir
    pub project: String,
    /// Placeholder for the temp dir in expected output (overrides config)
    pub placeholder: Option<String>,
    /// The actions to replay, in order
    pub actions: Vec<ScenarioAction>,
    /// Known-good source tree the result must match
    pub reference: Option<ReferenceCheck>,
}

fn default_section() -> usize {
    1
}

/// A single action of the replay
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// Write a code listing into the temp dir
    Write {
        /// The code listing step
        listing: StepRef,
    },
    /// Run a command step
    Run {
        /// The command step
        command: StepRef,
        /// Working directory relative to the temp dir (default: the project)
        cwd: Option<PathBuf>,
        /// Text appended to the command line before running
        append: Option<String>,
        /// Optional expectations for the result
        expect: Option<RunExpectation>,
    },
    /// Run a command that does not appear in the chapter
    Shell {
        /// Shell command line
        command: String,
        /// Working directory relative to the temp dir (default: the project)
        cwd: Option<PathBuf>,
        /// Optional expectations for the result
        expect: Option<RunExpectation>,
    },
    /// Compare the project's directory tree with an output step
    Tree {
        /// The output step holding the tree
        output: StepRef,
        /// Working directory relative to the temp dir (default: the project)
        cwd: Option<PathBuf>,
    },
    /// Check an output step against literal text instead of command output
    Literal {
        /// The output step
        output: StepRef,
        /// Text the step must contain (after trimming)
        text: String,
    },
    /// Mark a step as satisfied without verifying it
    Acknowledge {
        /// The step
        step: StepRef,
        /// Why it cannot be verified
        reason: String,
    },
}

/// Expectations for a command result
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RunExpectation {
    /// Output step the captured output must match
    pub output: Option<StepRef>,
    /// Compare as an unordered set of tokens (directory listings)
    #[serde(default)]
    pub unordered: bool,
    /// The command must print nothing
    #[serde(default)]
    pub empty: bool,
    /// Whether the command must exit with status 0 (unchecked when absent)
    pub success: Option<bool>,
}

/// Final comparison against a known-good git checkout
#[derive(Deserialize, Debug, Clone)]
pub struct ReferenceCheck {
    /// Path of the reference repository, relative to the scenario file
    pub repo: PathBuf,
    /// Tag or branch holding the expected end state
    pub tag: String,
    /// Name of the git remote to add
    #[serde(default = "default_remote")]
    pub remote: String,
}

fn default_remote() -> String {
    "repo".to_string()
}
