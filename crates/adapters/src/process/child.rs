// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real worker processes via `tokio::process`.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::{LaunchCommand, LaunchError, ProcessLauncher, WorkerProcess};

/// Launches worker processes as children of the director.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<Box<dyn WorkerProcess>, LaunchError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if command.visibility.shares_console() {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            // Detached workers must not receive the director's terminal signals.
            #[cfg(unix)]
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            program: command.program.display().to_string(),
            source,
        })?;
        debug!(pid = ?child.id(), command = %command.display_line(), "launched worker process");
        Ok(Box::new(ChildProcess::new(child)))
    }
}

/// A running (or exited) child process.
pub struct ChildProcess {
    child: Child,
    pid: Option<u32>,
    exited: bool,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            exited: false,
        }
    }
}

impl WorkerProcess for ChildProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_running(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = ?self.pid, %status, "worker process exited");
                self.exited = true;
                false
            }
            Err(e) => {
                warn!(pid = ?self.pid, error = %e, "failed to probe worker process");
                self.exited = true;
                false
            }
        }
    }

    fn kill(&mut self) {
        if self.exited {
            return;
        }
        if let Err(e) = self.child.start_kill() {
            warn!(pid = ?self.pid, error = %e, "failed to kill worker process");
        }
    }
}

#[cfg(test)]
#[path = "child_tests.rs"]
mod tests;
