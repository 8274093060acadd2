// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! How a worker process surfaces its own output.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerVisibility {
    /// Worker output is interleaved into the director's console.
    #[default]
    CombinedLogs,
    /// Each worker writes its own log file.
    SeparateLogs,
    /// Each worker writes its own log file and is detached from the
    /// director's console.
    SeparateWindows,
}

impl WorkerVisibility {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerVisibility::CombinedLogs => "combined-logs",
            WorkerVisibility::SeparateLogs => "separate-logs",
            WorkerVisibility::SeparateWindows => "separate-windows",
        }
    }

    /// Whether the worker inherits the director's stdout/stderr.
    pub fn shares_console(self) -> bool {
        self == WorkerVisibility::CombinedLogs
    }
}

impl std::fmt::Display for WorkerVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown worker visibility '{0}' (expected combined-logs, separate-logs or separate-windows)")]
pub struct ParseVisibilityError(String);

impl FromStr for WorkerVisibility {
    type Err = ParseVisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined-logs" | "combined" => Ok(WorkerVisibility::CombinedLogs),
            "separate-logs" | "logs" => Ok(WorkerVisibility::SeparateLogs),
            "separate-windows" | "windows" => Ok(WorkerVisibility::SeparateWindows),
            other => Err(ParseVisibilityError(other.to_string())),
        }
    }
}
