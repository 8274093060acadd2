// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the director crate.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Config file location override.
pub fn config_path() -> Option<PathBuf> {
    std::env::var_os("COOK_CONFIG").map(PathBuf::from)
}

/// Worker count override. Unparseable values are an error rather than
/// silently falling back to the file.
pub fn worker_count() -> Result<Option<u32>, ConfigError> {
    match std::env::var("COOK_WORKER_COUNT") {
        Ok(raw) => parse_worker_count(&raw).map(Some),
        Err(_) => Ok(None),
    }
}

pub(crate) fn parse_worker_count(raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::InvalidEnv {
            var: "COOK_WORKER_COUNT",
            value: raw.to_string(),
        })
}

pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os("COOK_LOG_DIR").map(PathBuf::from)
}

/// Resolve default log directory: XDG_STATE_HOME/cook/logs > ~/.local/state/cook/logs > ./cook-logs
pub fn default_log_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("cook/logs");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/state/cook/logs"),
        Err(_) => PathBuf::from("cook-logs"),
    }
}
