//! Step model
//!
//! A step is one instructional unit extracted from a listing block: a file
//! to write, a command to run, or output the reader should see.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a step
///
/// Derived from the listing block's anchor or listing tag so scenarios keep
/// pointing at the same step when unrelated listings are added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the `part`-th step of a block that produced several steps
    pub fn part(block: &str, part: usize) -> Self {
        Self(format!("{}.{}", block, part))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a step asks the reader to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    /// Source code to be written to `filename`
    CodeListing { filename: String, contents: String },
    /// A shell invocation
    Command { text: String },
    /// Expected console output
    Output { text: String },
}

impl StepKind {
    /// Human-readable variant name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CodeListing { .. } => "code listing",
            Self::Command { .. } => "command",
            Self::Output { .. } => "output",
        }
    }

    /// The action that satisfies a step of this kind
    pub fn satisfying_action(&self) -> Action {
        match self {
            Self::CodeListing { .. } => Action::Written,
            Self::Command { .. } => Action::Run,
            Self::Output { .. } => Action::Checked,
        }
    }
}

/// One parsed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn code_listing(id: StepId, filename: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            id,
            kind: StepKind::CodeListing {
                filename: filename.into(),
                contents: contents.into(),
            },
        }
    }

    pub fn command(id: StepId, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: StepKind::Command { text: text.into() },
        }
    }

    pub fn output(id: StepId, text: impl Into<String>) -> Self {
        Self {
            id,
            kind: StepKind::Output { text: text.into() },
        }
    }

    /// Command text, if this step is a command
    pub fn as_command(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Command { text } => Some(text),
            _ => None,
        }
    }

    /// Expected output text, if this step is an output
    pub fn as_output(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Output { text } => Some(text),
            _ => None,
        }
    }

    /// Whether a command step's text contains `needle`
    ///
    /// Always false for code listings and outputs.
    pub fn command_contains(&self, needle: &str) -> bool {
        self.as_command().is_some_and(|text| text.contains(needle))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StepKind::CodeListing { filename, contents } => {
                write!(f, "[{}]\n{}", filename, contents)
            }
            StepKind::Command { text } => write!(f, "$ {}", text),
            StepKind::Output { text } => f.write_str(text),
        }
    }
}

/// Action that satisfied a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Written,
    Run,
    Checked,
    /// Marked satisfied by the scenario without verification
    Acknowledged,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Written => "written",
            Self::Run => "run",
            Self::Checked => "checked",
            Self::Acknowledged => "acknowledged",
        };
        f.write_str(s)
    }
}

/// Progress of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "action", rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Satisfied(Action),
}

impl StepStatus {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }
}
