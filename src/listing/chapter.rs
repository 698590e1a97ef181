//! Parsed chapter and its status ledger
//!
//! Steps are immutable once parsed. Progress is kept beside them and only
//! changes through [`Chapter::record`], which accepts the statuses returned
//! by the execution and comparison engines.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use super::parser;
use super::step::{Action, Step, StepKind, StepStatus};
use crate::common::{Error, Result};

/// Reference to a step from a scenario: position or stable id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StepRef {
    Index(usize),
    Id(String),
}

impl fmt::Display for StepRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{}", i),
            Self::Id(id) => f.write_str(id),
        }
    }
}

/// All steps of one chapter, in document order
#[derive(Debug)]
pub struct Chapter {
    steps: Vec<Step>,
    status: Vec<StepStatus>,
    by_id: HashMap<String, usize>,
}

impl Chapter {
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            if by_id.insert(step.id.as_str().to_string(), i).is_some() {
                return Err(Error::parse(step.id.as_str(), "duplicate step id"));
            }
        }
        Ok(Self {
            status: vec![StepStatus::Pending; steps.len()],
            steps,
            by_id,
        })
    }

    /// Parse chapter `section` of an HTML document
    pub fn from_html(html: &str, section: usize) -> Result<Self> {
        Self::new(parser::parse_chapter(html, section)?)
    }

    /// Read and parse chapter `section` of the book at `path`
    pub fn load(path: &Path, section: usize) -> Result<Self> {
        let html = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_html(&html, section)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn status(&self, index: usize) -> StepStatus {
        self.status.get(index).copied().unwrap_or_default()
    }

    /// Resolve a scenario reference to a step index
    pub fn resolve(&self, step: &StepRef) -> Result<usize> {
        match step {
            StepRef::Index(i) if *i < self.steps.len() => Ok(*i),
            StepRef::Id(id) => match self.by_id.get(id) {
                Some(i) => Ok(*i),
                None => Err(Error::UnknownStep(id.clone())),
            },
            StepRef::Index(_) => Err(Error::UnknownStep(step.to_string())),
        }
    }

    /// Resolve a reference that must point at a code listing
    pub fn code_listing(&self, step: &StepRef) -> Result<(usize, &Step)> {
        self.expect_kind(step, "code listing")
    }

    /// Resolve a reference that must point at a command
    pub fn command(&self, step: &StepRef) -> Result<(usize, &Step)> {
        self.expect_kind(step, "command")
    }

    /// Resolve a reference that must point at an expected output
    pub fn output(&self, step: &StepRef) -> Result<(usize, &Step)> {
        self.expect_kind(step, "output")
    }

    fn expect_kind(&self, step: &StepRef, expected: &'static str) -> Result<(usize, &Step)> {
        let index = self.resolve(step)?;
        let found = &self.steps[index];
        if found.kind.name() != expected {
            return Err(Error::wrong_kind(
                index,
                found.id.as_str(),
                expected,
                found.kind.name(),
            ));
        }
        Ok((index, found))
    }

    /// Record the new status of step `index`
    ///
    /// Only forward transitions are accepted: the status must be satisfied,
    /// and by the action matching the step's kind (or an acknowledgement).
    pub fn record(&mut self, index: usize, status: StepStatus) -> Result<()> {
        let step = self
            .steps
            .get(index)
            .ok_or_else(|| Error::UnknownStep(format!("#{}", index)))?;

        let action = match status {
            StepStatus::Satisfied(action) => action,
            StepStatus::Pending => {
                return Err(Error::InvalidTransition {
                    index,
                    id: step.id.to_string(),
                    action: "pending".to_string(),
                })
            }
        };
        if action != Action::Acknowledged && action != step.kind.satisfying_action() {
            return Err(Error::InvalidTransition {
                index,
                id: step.id.to_string(),
                action: action.to_string(),
            });
        }

        if self.status[index].is_satisfied() {
            tracing::debug!(index, id = %step.id, %action, "Step satisfied again");
        }
        self.status[index] = status;
        Ok(())
    }

    /// Steps whose action never happened, in document order
    pub fn unsatisfied(&self) -> impl Iterator<Item = (usize, &Step)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.status[*i].is_satisfied())
    }

    /// Completeness audit: every listing written, command run, output checked
    pub fn audit(&self) -> Result<()> {
        let missing: Vec<(usize, &Step)> = self.unsatisfied().collect();
        for (index, step) in &missing {
            let verb = match step.kind {
                StepKind::CodeListing { .. } => "not written",
                StepKind::Command { .. } => "not run",
                StepKind::Output { .. } => "not checked",
            };
            tracing::warn!(index, id = %step.id, "{} {}", step.kind.name(), verb);
        }

        match missing.first() {
            None => Ok(()),
            Some((index, step)) => Err(Error::IncompleteScenario {
                index: *index,
                id: step.id.to_string(),
                content: step.to_string(),
                unsatisfied: missing.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::step::StepId;

    fn chapter() -> Chapter {
        Chapter::new(vec![
            Step::code_listing(StepId::new("ch01l001"), "hello.py", "print('hi')"),
            Step::command(StepId::new("listing-2.0"), "python3 hello.py"),
            Step::output(StepId::new("listing-2.1"), "hi"),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_by_index_and_id() {
        let chapter = chapter();
        assert_eq!(chapter.resolve(&StepRef::Index(2)).unwrap(), 2);
        assert_eq!(chapter.resolve(&StepRef::Id("listing-2.0".into())).unwrap(), 1);
        assert!(matches!(
            chapter.resolve(&StepRef::Index(3)),
            Err(Error::UnknownStep(_))
        ));
        assert!(matches!(
            chapter.resolve(&StepRef::Id("nope".into())),
            Err(Error::UnknownStep(_))
        ));
    }

    #[test]
    fn test_kind_checks() {
        let chapter = chapter();
        assert!(chapter.command(&StepRef::Index(1)).is_ok());
        let err = chapter.output(&StepRef::Index(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongStepKind {
                expected: "output",
                actual: "command",
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Chapter::new(vec![
            Step::output(StepId::new("same"), "a"),
            Step::output(StepId::new("same"), "b"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step id"));
    }

    #[test]
    fn test_record_rejects_mismatched_action() {
        let mut chapter = chapter();
        let err = chapter
            .record(1, StepStatus::Satisfied(Action::Written))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { index: 1, .. }));
        assert!(chapter.record(1, StepStatus::Pending).is_err());
    }

    #[test]
    fn test_satisfied_steps_do_not_regress() {
        let mut chapter = chapter();
        chapter.record(1, StepStatus::Satisfied(Action::Run)).unwrap();
        assert!(chapter.record(1, StepStatus::Pending).is_err());
        assert_eq!(chapter.status(1), StepStatus::Satisfied(Action::Run));
    }

    #[test]
    fn test_audit_names_unexercised_step() {
        let mut chapter = chapter();
        chapter.record(0, StepStatus::Satisfied(Action::Written)).unwrap();
        chapter.record(1, StepStatus::Satisfied(Action::Run)).unwrap();

        match chapter.audit().unwrap_err() {
            Error::IncompleteScenario {
                index,
                id,
                content,
                unsatisfied,
            } => {
                assert_eq!(index, 2);
                assert_eq!(id, "listing-2.1");
                assert_eq!(content, "hi");
                assert_eq!(unsatisfied, 1);
            }
            other => panic!("Expected IncompleteScenario, got {:?}", other),
        }

        chapter
            .record(2, StepStatus::Satisfied(Action::Acknowledged))
            .unwrap();
        chapter.audit().unwrap();
    }

    #[test]
    fn test_step_ref_from_yaml() {
        let refs: Vec<StepRef> = serde_yaml::from_str("[3, ch01l001]").unwrap();
        assert_eq!(refs, vec![StepRef::Index(3), StepRef::Id("ch01l001".into())]);
    }
}
