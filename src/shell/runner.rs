//! Shell command execution
//!
//! Commands run through the configured shell in a fresh process group with
//! stdout and stderr sharing one pipe, so the captured text interleaves the
//! two streams the way a terminal would show them.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use super::group::{kill_group, ProcessGroups};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::listing::{Action, Step, StepStatus};

/// What running a command produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Merged stdout/stderr; `None` for server commands left running
    pub output: Option<String>,
    /// Exit code; `None` for server commands or signal deaths
    pub exit_code: Option<i32>,
    /// New status of the command step (`Pending` for ad-hoc commands)
    pub status: StepStatus,
}

impl RunOutcome {
    /// Captured output, empty when nothing was captured
    pub fn text(&self) -> &str {
        self.output.as_deref().unwrap_or("")
    }

    /// Whether the command was a server left running in the background
    pub fn is_background(&self) -> bool {
        self.output.is_none()
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs listing commands and owns the process groups they spawn
#[derive(Debug)]
pub struct ShellRunner {
    shell: PathBuf,
    timeout: Option<Duration>,
    server_markers: Vec<String>,
    groups: ProcessGroups,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>, timeout: Option<Duration>, server_markers: Vec<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout,
            server_markers,
            groups: ProcessGroups::new(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.shell_path()?,
            config.command_timeout(),
            config.server.markers.clone(),
        ))
    }

    /// Whether `text` starts a process that never exits on its own
    pub fn is_server(&self, text: &str) -> bool {
        self.server_markers.iter().any(|m| text.contains(m.as_str()))
    }

    /// Run a command step
    ///
    /// The step counts as run once it has been started; a non-zero exit code
    /// is reported in the outcome, not as an error.
    pub async fn run(&mut self, step: &Step, cwd: &Path) -> Result<RunOutcome> {
        self.run_with_suffix(step, None, cwd).await
    }

    /// Run a command step with extra text appended to its command line
    pub async fn run_with_suffix(
        &mut self,
        step: &Step,
        suffix: Option<&str>,
        cwd: &Path,
    ) -> Result<RunOutcome> {
        let text = step.as_command().ok_or_else(|| {
            Error::TestAssertion(format!(
                "step {} is a {}, not a command",
                step.id,
                step.kind.name()
            ))
        })?;
        let text = match suffix {
            Some(suffix) => format!("{}{}", text, suffix),
            None => text.to_string(),
        };

        let mut outcome = self.execute(&text, cwd).await?;
        outcome.status = StepStatus::Satisfied(Action::Run);
        Ok(outcome)
    }

    /// Run a command that is not part of the chapter
    pub async fn run_text(&mut self, text: &str, cwd: &Path) -> Result<RunOutcome> {
        self.execute(text, cwd).await
    }

    /// Terminate every process group started so far
    pub fn shutdown(&mut self) -> Vec<Error> {
        self.groups.terminate_all()
    }

    async fn execute(&mut self, text: &str, cwd: &Path) -> Result<RunOutcome> {
        tracing::info!(command = text, cwd = %cwd.display(), "Running command");

        let mut std_cmd = std::process::Command::new(&self.shell);
        std_cmd.arg("-c").arg(text).current_dir(cwd).stdin(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        if self.is_server(text) {
            std_cmd.stdout(Stdio::null()).stderr(Stdio::null());
            let child = tokio::process::Command::from(std_cmd)
                .spawn()
                .map_err(|e| Error::command_failed(text, e.to_string()))?;
            if let Some(pid) = child.id() {
                self.groups.register(pid as i32, text);
            }
            tracing::info!(command = text, "Left server running");
            return Ok(RunOutcome {
                output: None,
                exit_code: None,
                status: StepStatus::Pending,
            });
        }

        let (mut reader, writer) = std::io::pipe()?;
        std_cmd.stdout(writer.try_clone()?).stderr(writer);
        let mut cmd = tokio::process::Command::from(std_cmd);
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::command_failed(text, e.to_string()))?;
        // our copies of the write end must close for the reader to see EOF
        drop(cmd);

        let pgid = child.id().map(|pid| pid as i32);
        if let Some(pgid) = pgid {
            self.groups.register(pgid, text);
        }

        let read = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).map(|_| buf)
        });
        let finished = async {
            let status = child.wait().await?;
            let bytes = read
                .await
                .map_err(|e| Error::Internal(format!("Output reader failed: {}", e)))??;
            Ok::<_, Error>((status, bytes))
        };

        let (status, bytes) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, finished).await {
                Ok(result) => result?,
                Err(_) => {
                    if let Some(pgid) = pgid {
                        kill_group(pgid);
                    }
                    return Err(Error::CommandTimeout {
                        command: text.to_string(),
                        secs: limit.as_secs(),
                    });
                }
            },
            None => finished.await?,
        };

        let output = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!(
            command = text,
            exit_code = ?status.code(),
            bytes = bytes.len(),
            "Command finished"
        );

        Ok(RunOutcome {
            output: Some(output),
            exit_code: status.code(),
            status: StepStatus::Pending,
        })
    }
}
