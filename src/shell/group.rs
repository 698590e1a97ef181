//! Process group bookkeeping
//!
//! Every listing command runs in its own process group so a command and
//! everything it started (servers, browsers) can be stopped with one signal.

use crate::common::Error;

/// A spawned process group
#[derive(Debug, Clone)]
pub struct ProcessGroup {
    pub pgid: i32,
    pub command: String,
}

/// Scoped owner of spawned process groups
///
/// Groups are sent SIGTERM when [`ProcessGroups::terminate_all`] runs or the
/// owner is dropped, whichever comes first. Failures are logged and never
/// returned to the scenario.
#[derive(Debug, Default)]
pub struct ProcessGroups {
    groups: Vec<ProcessGroup>,
}

impl ProcessGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pgid: i32, command: &str) {
        tracing::debug!(pgid, command, "Registered process group");
        self.groups.push(ProcessGroup {
            pgid,
            command: command.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Send SIGTERM to every registered group
    ///
    /// Returns the failures, which have already been logged. Groups whose
    /// processes all exited are not failures.
    pub fn terminate_all(&mut self) -> Vec<Error> {
        let mut failures = Vec::new();
        for group in self.groups.drain(..) {
            if let Err(e) = terminate(&group) {
                tracing::warn!(pgid = group.pgid, command = %group.command, "{}", e);
                failures.push(e);
            }
        }
        failures
    }
}

impl Drop for ProcessGroups {
    fn drop(&mut self) {
        if !self.groups.is_empty() {
            self.terminate_all();
        }
    }
}

/// Forcefully stop a process group that overran its timeout
#[cfg(unix)]
pub(crate) fn kill_group(pgid: i32) {
    // SAFETY: killpg has no memory-safety preconditions
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        let err = std::io::Error::last_os_error();
        tracing::warn!(pgid, "Failed to kill process group: {}", err);
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(pgid: i32) {
    tracing::warn!(pgid, "Process groups are only supported on Unix");
}

#[cfg(unix)]
fn terminate(group: &ProcessGroup) -> Result<(), Error> {
    // SAFETY: killpg has no memory-safety preconditions
    let rc = unsafe { libc::killpg(group.pgid, libc::SIGTERM) };
    if rc == 0 {
        tracing::debug!(pgid = group.pgid, "Terminated process group");
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        tracing::trace!(pgid = group.pgid, "Process group already gone");
        return Ok(());
    }
    Err(Error::ProcessTermination {
        pgid: group.pgid,
        command: group.command.clone(),
        reason: err.to_string(),
    })
}

#[cfg(not(unix))]
fn terminate(group: &ProcessGroup) -> Result<(), Error> {
    Err(Error::ProcessTermination {
        pgid: group.pgid,
        command: group.command.clone(),
        reason: "process groups are only supported on Unix".to_string(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    #[test]
    fn test_terminate_running_group() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();

        let mut groups = ProcessGroups::new();
        groups.register(child.id() as i32, "sleep 30");
        assert_eq!(groups.len(), 1);

        assert!(groups.terminate_all().is_empty());
        assert!(groups.is_empty());

        let status = child.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_exited_group_is_not_a_failure() {
        let mut child = Command::new("true").process_group(0).spawn().unwrap();
        let pgid = child.id() as i32;
        child.wait().unwrap();

        let mut groups = ProcessGroups::new();
        groups.register(pgid, "true");
        assert!(groups.terminate_all().is_empty());
    }

    #[test]
    fn test_drop_terminates() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        {
            let mut groups = ProcessGroups::new();
            groups.register(child.id() as i32, "sleep 30");
        }
        let status = child.wait().unwrap();
        assert!(!status.success());
    }
}
