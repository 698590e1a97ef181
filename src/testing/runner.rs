//! Scenario runner
//!
//! Replays a chapter's steps in a temporary directory: listings are written,
//! commands are run and their output is compared with the book. Once every
//! action has run, the completeness audit makes sure no step was skipped.

use std::path::{Component, Path, PathBuf};

use colored::Colorize;

use crate::common::config::Config;
use crate::common::paths::resolve_relative;
use crate::common::{Error, Result};
use crate::compare::{CompareMode, Comparator};
use crate::listing::{Action, Chapter, Step, StepRef, StepStatus};
use crate::shell::{RunOutcome, ShellRunner};

use super::config::{ReferenceCheck, RunExpectation, ScenarioAction, TestScenario};

/// Command used to list the project tree
const TREE_COMMAND: &str = "tree -I '*.pyc' --noreport --charset=utf-8";

/// Quote `arg` as a single POSIX shell word
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Result of a scenario run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub actions_run: usize,
    pub actions_total: usize,
    pub error: Option<String>,
}

/// Options for a scenario run
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Print every command as it runs
    pub verbose: bool,
    /// Leave the temporary directory behind for inspection
    pub keep_temp: bool,
}

/// Load a scenario from a YAML file
pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))
}

/// Run a chapter scenario from a YAML file
pub async fn run_scenario(path: &Path, config: &Config, options: &RunOptions) -> Result<TestResult> {
    let scenario = load_scenario(path)?;
    let scenario_dir = path.parent().unwrap_or(Path::new("."));
    let actions_total = scenario.actions.len();

    println!(
        "\n{} {}",
        "Running Scenario:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let book = resolve_relative(scenario_dir, &scenario.book);
    let chapter = Chapter::load(&book, scenario.section)?;
    println!(
        "  {} {} steps from {}",
        "Parsed".cyan(),
        chapter.len(),
        book.display().to_string().dimmed()
    );

    let temp = tempfile::Builder::new().prefix("bookcheck-").tempdir()?;
    // compare against the path the shell reports, not a symlinked alias
    let root = temp.path().canonicalize()?;
    let _temp_guard = if options.keep_temp {
        let kept = temp.keep();
        println!("  {} {}", "Keeping".cyan(), kept.display());
        None
    } else {
        Some(temp)
    };

    let placeholder = scenario
        .placeholder
        .clone()
        .unwrap_or_else(|| config.compare.placeholder.clone());
    let runner = ShellRunner::from_config(config)?;
    let mut run = ScenarioRun::new(chapter, root, &scenario.project, runner, &placeholder);

    println!("\n{}", "Actions:".cyan());

    for (i, action) in scenario.actions.iter().enumerate() {
        let action_num = i + 1;
        let label = run.describe(action);
        if options.verbose {
            println!("  {} {}", "…".dimmed(), label.dimmed());
        }

        if let Err(e) = run.execute(action).await {
            println!("  {} Action {}: {}", "✗".red(), action_num, label);
            println!("    {}", e);
            run.shutdown();
            return Ok(TestResult {
                name: scenario.name,
                passed: false,
                actions_run: action_num,
                actions_total,
                error: Some(e.to_string()),
            });
        }
        println!("  {} Action {}: {}", "✓".green(), action_num, label.dimmed());
    }

    let finish = match &scenario.reference {
        Some(reference) => {
            let repo = resolve_relative(scenario_dir, &reference.repo);
            run.verify_reference(reference, &repo).await
        }
        None => Ok(()),
    }
    .and_then(|()| run.audit());
    run.shutdown();

    if let Err(e) = finish {
        println!("  {} {}", "✗".red(), e);
        return Ok(TestResult {
            name: scenario.name,
            passed: false,
            actions_run: actions_total,
            actions_total,
            error: Some(e.to_string()),
        });
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Scenario Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name,
        passed: true,
        actions_run: actions_total,
        actions_total,
        error: None,
    })
}

/// Write a code listing below `root`
///
/// Returns the listing's new status.
pub fn write_listing(root: &Path, index: usize, step: &Step) -> Result<StepStatus> {
    let (filename, contents) = match &step.kind {
        crate::listing::StepKind::CodeListing { filename, contents } => (filename, contents),
        other => {
            return Err(Error::wrong_kind(index, step.id.as_str(), "code listing", other.name()))
        }
    };

    let relative = Path::new(filename);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(Error::TestAssertion(format!(
            "Listing {} ({}) writes outside the workspace: {}",
            index, step.id, filename
        )));
    }

    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents)?;
    tracing::info!(file = %path.display(), bytes = contents.len(), "Wrote listing");
    Ok(StepStatus::Satisfied(Action::Written))
}

/// One replay of a chapter inside a working directory
pub struct ScenarioRun {
    chapter: Chapter,
    root: PathBuf,
    project: String,
    runner: ShellRunner,
    comparator: Comparator,
}

impl ScenarioRun {
    pub fn new(
        chapter: Chapter,
        root: PathBuf,
        project: &str,
        runner: ShellRunner,
        placeholder: &str,
    ) -> Self {
        let comparator = Comparator::new(&root, placeholder);
        Self {
            chapter,
            root,
            project: project.to_string(),
            runner,
            comparator,
        }
    }

    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    /// Working directory for an action, relative to the temp dir
    fn cwd(&self, cwd: Option<&Path>) -> PathBuf {
        match cwd {
            None => self.root.join(&self.project),
            Some(p) if p.as_os_str().is_empty() || p == Path::new(".") => self.root.clone(),
            Some(p) => self.root.join(p),
        }
    }

    /// Short description of an action for progress output
    pub fn describe(&self, action: &ScenarioAction) -> String {
        let step = |r: &StepRef| {
            self.chapter
                .resolve(r)
                .ok()
                .and_then(|i| self.chapter.step(i))
        };
        match action {
            ScenarioAction::Write { listing } => match step(listing).map(|s| &s.kind) {
                Some(crate::listing::StepKind::CodeListing { filename, .. }) => {
                    format!("write {}", filename)
                }
                _ => format!("write {}", listing),
            },
            ScenarioAction::Run { command, append, .. } => {
                let text = step(command)
                    .and_then(|s| s.as_command())
                    .map(str::to_string)
                    .unwrap_or_else(|| command.to_string());
                format!("$ {}{}", text, append.as_deref().unwrap_or(""))
            }
            ScenarioAction::Shell { command, .. } => format!("$ {} (ad hoc)", command),
            ScenarioAction::Tree { output, .. } => format!("tree matches {}", output),
            ScenarioAction::Literal { output, text } => format!("{} reads '{}'", output, text),
            ScenarioAction::Acknowledge { step, reason } => {
                format!("acknowledge {} ({})", step, reason)
            }
        }
    }

    /// Execute one action
    pub async fn execute(&mut self, action: &ScenarioAction) -> Result<()> {
        match action {
            ScenarioAction::Write { listing } => {
                let (index, step) = self.chapter.code_listing(listing)?;
                let status = write_listing(&self.root, index, step)?;
                self.chapter.record(index, status)
            }
            ScenarioAction::Run {
                command,
                cwd,
                append,
                expect,
            } => {
                let (index, step) = self.chapter.command(command)?;
                let step = step.clone();
                let cwd = self.cwd(cwd.as_deref());
                let outcome = self
                    .runner
                    .run_with_suffix(&step, append.as_deref(), &cwd)
                    .await?;
                self.chapter.record(index, outcome.status)?;
                match expect {
                    Some(expect) => self.check_expectation(&step.to_string(), &outcome, expect),
                    None => Ok(()),
                }
            }
            ScenarioAction::Shell {
                command,
                cwd,
                expect,
            } => {
                let cwd = self.cwd(cwd.as_deref());
                let outcome = self.runner.run_text(command, &cwd).await?;
                match expect {
                    Some(expect) => self.check_expectation(command, &outcome, expect),
                    None => Ok(()),
                }
            }
            ScenarioAction::Tree { output, cwd } => self.check_tree(output, cwd.as_deref()).await,
            ScenarioAction::Literal { output, text } => {
                let (index, step) = self.chapter.output(output)?;
                let actual = step.as_output().unwrap_or_default().trim();
                if actual != text.trim() {
                    return Err(Error::Mismatch {
                        index,
                        id: step.id.to_string(),
                        expected: text.clone(),
                        actual: actual.to_string(),
                    });
                }
                self.chapter
                    .record(index, StepStatus::Satisfied(Action::Checked))
            }
            ScenarioAction::Acknowledge { step, reason } => {
                let index = self.chapter.resolve(step)?;
                tracing::warn!(index, step = %step, reason = %reason, "Step acknowledged without verification");
                self.chapter
                    .record(index, StepStatus::Satisfied(Action::Acknowledged))
            }
        }
    }

    fn check_expectation(
        &mut self,
        command: &str,
        outcome: &RunOutcome,
        expect: &RunExpectation,
    ) -> Result<()> {
        if outcome.is_background()
            && (expect.output.is_some() || expect.empty || expect.success.is_some())
        {
            return Err(Error::TestAssertion(format!(
                "'{}' was left running in the background; its result cannot be checked",
                command
            )));
        }

        if let Some(should_succeed) = expect.success {
            if outcome.success() != should_succeed {
                return Err(Error::command_failed(
                    command,
                    format!(
                        "expected success={}, exit code {:?}:\n{}",
                        should_succeed,
                        outcome.exit_code,
                        outcome.text()
                    ),
                ));
            }
        }

        if expect.empty && !outcome.text().trim().is_empty() {
            return Err(Error::TestAssertion(format!(
                "'{}' was expected to print nothing, got:\n{}",
                command,
                outcome.text()
            )));
        }

        if let Some(output) = &expect.output {
            let mode = if expect.unordered {
                CompareMode::Unordered
            } else {
                CompareMode::Ordered
            };
            let (index, step) = self.chapter.output(output)?;
            let status = self.comparator.check(outcome.text(), index, step, mode)?;
            self.chapter.record(index, status)?;
        }
        Ok(())
    }

    async fn check_tree(&mut self, output: &StepRef, cwd: Option<&Path>) -> Result<()> {
        let (index, step) = self.chapter.output(output)?;
        let expected_text = step.as_output().unwrap_or_default();

        // the book shows the first tree rooted at the project name, later ones at '.'
        let root_prefix = format!("{}/", self.project);
        let expected = if expected_text.starts_with(&root_prefix) {
            tracing::debug!(index, "Rewriting tree root to '.'");
            Step::output(step.id.clone(), expected_text.replacen(&root_prefix, ".", 1))
        } else {
            step.clone()
        };

        let cwd = self.cwd(cwd);
        let outcome = self.runner.run_text(TREE_COMMAND, &cwd).await?;
        let status = self
            .comparator
            .check(outcome.text(), index, &expected, CompareMode::Ordered)?;
        self.chapter.record(index, status)
    }

    /// Require the project to match a branch or tag of a known-good repository
    pub async fn verify_reference(&mut self, reference: &ReferenceCheck, repo: &Path) -> Result<()> {
        let cwd = self.cwd(None);
        let remote = shell_quote(&reference.remote);
        let commands = [
            format!(
                "git remote add {} {}",
                remote,
                shell_quote(&repo.to_string_lossy())
            ),
            format!("git fetch --tags {}", remote),
        ];
        for command in &commands {
            let outcome = self.runner.run_text(command, &cwd).await?;
            if !outcome.success() {
                return Err(Error::command_failed(command, outcome.text().to_string()));
            }
        }

        let target = self.resolve_reference(reference, &cwd).await?;
        let diff_command = format!("git diff {} --", shell_quote(&target));
        let diff = self.runner.run_text(&diff_command, &cwd).await?;
        if !diff.success() {
            return Err(Error::command_failed(&diff_command, diff.text().to_string()));
        }
        if !diff.text().trim().is_empty() {
            return Err(Error::TestAssertion(format!(
                "Project differs from {}:\n{}",
                target,
                diff.text()
            )));
        }
        tracing::info!(reference = %target, "Project matches reference");
        Ok(())
    }

    /// Full ref name of the reference state: a fetched branch, else a tag
    async fn resolve_reference(&mut self, reference: &ReferenceCheck, cwd: &Path) -> Result<String> {
        let candidates = [
            format!("refs/remotes/{}/{}", reference.remote, reference.tag),
            format!("refs/tags/{}", reference.tag),
        ];
        for candidate in candidates {
            let command = format!("git rev-parse --verify --quiet {}", shell_quote(&candidate));
            if self.runner.run_text(&command, cwd).await?.success() {
                tracing::debug!(reference = %candidate, "Resolved reference");
                return Ok(candidate);
            }
        }
        Err(Error::TestAssertion(format!(
            "'{}' is neither a branch nor a tag of remote '{}'",
            reference.tag, reference.remote
        )))
    }

    /// Fail if any step of the chapter was never exercised
    pub fn audit(&self) -> Result<()> {
        self.chapter.audit()
    }

    /// Terminate everything the chapter's commands left running
    pub fn shutdown(&mut self) {
        let failures = self.runner.shutdown();
        if !failures.is_empty() {
            tracing::warn!(count = failures.len(), "Some process groups could not be terminated");
        }
    }
}
