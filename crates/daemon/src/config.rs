// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Director configuration.
//!
//! Resolved in layers: built-in defaults, an optional TOML file, the
//! environment, then command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cook_core::{TargetName, WorkerVisibility};
use cook_engine::RuntimeConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::director::DirectorOptions;
use crate::env;
use crate::protocol::Configure;
use crate::worker_server::WorkerServerConfig;

pub const DEFAULT_PORT: u16 = 41899;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {var}={value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorConfig {
    pub worker_count: u32,
    pub listen_host: String,
    pub listen_port: u16,
    pub worker_visibility: WorkerVisibility,
    /// Defaults to `cook-worker` beside the director executable.
    pub worker_executable: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub disconnect_timeout_secs: u64,
    pub liveness_interval_ms: u64,
    pub shutdown_poll_ms: u64,
    pub stall_warn_after_secs: u64,
    pub stall_warn_interval_secs: u64,
    pub request_batch_size: usize,
    /// Shell template with `{item}` and `{target}` placeholders.
    pub build_command: Option<String>,
    pub build_timeout_secs: u64,
    pub log_dir: Option<PathBuf>,
    pub no_timeouts: bool,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            listen_host: "127.0.0.1".to_string(),
            listen_port: DEFAULT_PORT,
            worker_visibility: WorkerVisibility::CombinedLogs,
            worker_executable: None,
            connect_timeout_secs: 60,
            disconnect_timeout_secs: 30,
            liveness_interval_ms: 1000,
            shutdown_poll_ms: 10,
            stall_warn_after_secs: 60,
            stall_warn_interval_secs: 60,
            request_batch_size: 256,
            build_command: None,
            build_timeout_secs: 600,
            log_dir: None,
            no_timeouts: false,
        }
    }
}

/// Values taken from the environment, applied over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub worker_count: Option<u32>,
    pub log_dir: Option<PathBuf>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            worker_count: env::worker_count()?,
            log_dir: env::log_dir(),
        })
    }
}

impl DirectorConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self, overrides: EnvOverrides) {
        if let Some(count) = overrides.worker_count {
            self.worker_count = count;
        }
        if let Some(dir) = overrides.log_dir {
            self.log_dir = Some(dir);
        }
    }

    /// `None` when timeouts are disabled.
    fn timeout(&self, secs: u64) -> Option<Duration> {
        (!self.no_timeouts).then(|| Duration::from_secs(secs))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(env::default_log_dir)
    }

    /// Sent to every worker after its handshake.
    pub fn worker_configure(&self, targets: &[TargetName]) -> Configure {
        Configure {
            targets: targets.to_vec(),
            build_command: self.build_command.clone(),
            build_timeout_secs: self.timeout(self.build_timeout_secs).map(|t| t.as_secs()),
            no_timeouts: self.no_timeouts,
        }
    }

    pub fn director_options(&self, targets: &[TargetName], worker_executable: PathBuf) -> DirectorOptions {
        // Separate-log workers need to know where to write.
        let log_dir = (!self.worker_visibility.shares_console()).then(|| self.log_dir());
        DirectorOptions {
            worker_count: self.worker_count,
            worker_executable,
            visibility: self.worker_visibility,
            log_dir,
            no_timeouts: self.no_timeouts,
            shutdown_poll: Duration::from_millis(self.shutdown_poll_ms),
            stall_warn_after: Duration::from_secs(self.stall_warn_after_secs),
            stall_warn_interval: Duration::from_secs(self.stall_warn_interval_secs),
            server: WorkerServerConfig {
                connect_timeout: self.timeout(self.connect_timeout_secs),
                disconnect_timeout: self.timeout(self.disconnect_timeout_secs),
                liveness_interval: Duration::from_millis(self.liveness_interval_ms),
                configure: self.worker_configure(targets),
            },
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            request_batch_size: self.request_batch_size.max(1),
            ..RuntimeConfig::default()
        }
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.timeout(self.build_timeout_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
