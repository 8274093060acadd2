// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-command build executor

use std::time::Duration;

use async_trait::async_trait;
use cook_adapters::{run_with_timeout, shell_command};
use cook_core::{ItemName, TargetBuild, TargetName};
use cook_storage::LoadedPayload;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use super::BuildExecutor;
use crate::BuildError;

/// Runs a shell template once per (item, target).
///
/// `{item}` and `{target}` in the template are replaced before running it
/// with `sh -c`. A zero exit status means the target built.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    template: String,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(template: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            template: template.into(),
            timeout,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn render(&self, item: &ItemName, target: &TargetName) -> String {
        self.template
            .replace("{item}", item.as_str())
            .replace("{target}", target.as_str())
    }
}

#[async_trait]
impl BuildExecutor for CommandExecutor {
    async fn load(&self, item: &ItemName) -> Result<LoadedPayload, BuildError> {
        if self.template.trim().is_empty() {
            return Err(BuildError::Load {
                item: item.clone(),
                message: "no build command configured".to_string(),
            });
        }
        Ok(serde_json::json!({ "item": item.as_str() }))
    }

    async fn save(
        &self,
        item: &ItemName,
        _loaded: &LoadedPayload,
        target: &TargetName,
    ) -> TargetBuild {
        let script = self.render(item, target);
        let description = format!("build {} for {}", item, target);
        debug!(item = %item, target = %target, script = %script, "running build command");

        let output = match run_with_timeout(shell_command(&script), self.timeout, &description).await
        {
            Ok(output) => output,
            Err(e) => return TargetBuild::failed(target.clone(), e.to_string()),
        };

        let mut side_messages: Vec<String> = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        let succeeded = output.status.success();
        if !succeeded {
            side_messages.push(format!("{} exited with {}", description, output.status));
        }
        TargetBuild {
            target: target.clone(),
            succeeded,
            build_id: Some(Uuid::new_v4().to_string()),
            dependency_digest: Some(format!("{:x}", Sha256::digest(&output.stdout))),
            side_messages,
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
