//! Console output comparison
//!
//! Actual output is checked against an expected output step after making it
//! independent of the machine it ran on: the scenario's temporary directory
//! is replaced with a fixed placeholder and tabs are expanded.

use std::path::Path;

use crate::common::{normalize_newlines, Error, Result};
use crate::listing::{Action, Step, StepStatus};

/// Spaces substituted for a literal tab in actual output
const TAB_EXPANSION: &str = "       ";

/// How actual and expected output are matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    /// Exact text after normalization
    #[default]
    Ordered,
    /// Same whitespace-separated tokens in any order (directory listings)
    Unordered,
}

/// Compares actual console output with expected output steps
#[derive(Debug, Clone)]
pub struct Comparator {
    temp_dir: String,
    placeholder: String,
}

impl Comparator {
    pub fn new(temp_dir: &Path, placeholder: impl Into<String>) -> Self {
        Self {
            temp_dir: temp_dir.to_string_lossy().into_owned(),
            placeholder: placeholder.into(),
        }
    }

    /// Replace every occurrence of the temporary directory with the placeholder
    pub fn substitute_paths(&self, actual: &str) -> String {
        if self.temp_dir.is_empty() || !actual.contains(&self.temp_dir) {
            return actual.to_string();
        }
        actual.replace(&self.temp_dir, &self.placeholder)
    }

    /// Check `actual` against the output step at `index`
    ///
    /// Returns the step's new status on success.
    pub fn check(&self, actual: &str, index: usize, expected: &Step, mode: CompareMode) -> Result<StepStatus> {
        let expected_text = expected.as_output().ok_or_else(|| {
            Error::wrong_kind(index, expected.id.as_str(), "output", expected.kind.name())
        })?;
        if let Err((want, got)) = self.compare(actual, expected_text, mode) {
            return Err(Error::Mismatch {
                index,
                id: expected.id.to_string(),
                expected: want,
                actual: got,
            });
        }
        tracing::debug!(index, id = %expected.id, ?mode, "Output matched");
        Ok(StepStatus::Satisfied(Action::Checked))
    }

    /// Compare texts, returning the normalized pair on mismatch
    pub fn compare(&self, actual: &str, expected: &str, mode: CompareMode) -> std::result::Result<(), (String, String)> {
        let actual = self.substitute_paths(actual);
        match mode {
            CompareMode::Ordered => {
                let actual = actual.trim().replace('\t', TAB_EXPANSION);
                let expected = normalize_newlines(expected);
                if actual == expected {
                    Ok(())
                } else {
                    Err((expected, actual))
                }
            }
            CompareMode::Unordered => {
                let mut actual_tokens: Vec<&str> = actual.split_whitespace().collect();
                let mut expected_tokens: Vec<&str> = expected.split_whitespace().collect();
                actual_tokens.sort_unstable();
                expected_tokens.sort_unstable();
                if actual_tokens == expected_tokens {
                    Ok(())
                } else {
                    Err((expected_tokens.join("\n"), actual_tokens.join("\n")))
                }
            }
        }
    }
}
