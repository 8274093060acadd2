// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process launching and liveness probing.

mod child;

pub use child::{ChildProcess, TokioLauncher};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLauncher, FakeProcessHandle};

use std::path::PathBuf;

use cook_core::WorkerVisibility;
use thiserror::Error;

/// Errors from process launching
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("launch refused: {0}")]
    Refused(String),
}

/// Everything needed to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub visibility: WorkerVisibility,
}

impl LaunchCommand {
    /// Render as a single shell-like line for logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Starts worker processes.
pub trait ProcessLauncher: Send + 'static {
    fn launch(&self, command: &LaunchCommand) -> Result<Box<dyn WorkerProcess>, LaunchError>;
}

/// Handle to a launched worker process. Every method is non-blocking.
pub trait WorkerProcess: Send {
    /// OS process id, if known.
    fn pid(&self) -> Option<u32>;

    /// Probe whether the process is still running.
    fn is_running(&mut self) -> bool;

    /// Request forced termination. Does not wait for the exit.
    fn kill(&mut self);
}
