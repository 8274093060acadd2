// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

/// Default timeout for a single target build command.
/// Set to 10 minutes as a safety net for long-running build scripts.
pub const BUILD_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors from running a subprocess to completion
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        description: String,
        timeout: Duration,
    },
}

/// Build a `sh -c <script>` command.
pub fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

/// Run a subprocess command with an optional timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`. The child process
/// is killed automatically if the timeout elapses (via `kill_on_drop`).
/// `None` waits indefinitely.
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Option<Duration>,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    let io_err = |source| SubprocessError::Io {
        description: description.to_string(),
        source,
    };
    match timeout {
        None => cmd.output().await.map_err(io_err),
        Some(timeout) => match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(result) => result.map_err(io_err),
            Err(_elapsed) => Err(SubprocessError::TimedOut {
                description: description.to_string(),
                timeout,
            }),
        },
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
