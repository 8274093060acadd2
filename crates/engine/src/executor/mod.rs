// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external build collaborator.
//!
//! The engine never knows what building an item means. It asks an executor
//! to load an item once and then save it for each requested target.

mod command;

pub use command::CommandExecutor;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ExecutorCall, FakeExecutor};

use std::collections::BTreeSet;

use async_trait::async_trait;
use cook_core::{ItemName, TargetBuild, TargetName};
use cook_storage::LoadedPayload;
use tracing::warn;

use crate::BuildError;

/// Builds work items for targets.
#[async_trait]
pub trait BuildExecutor: Send + Sync + 'static {
    /// A reason to skip the item entirely, if any.
    fn suppress_reason(&self, _item: &ItemName) -> Option<String> {
        None
    }

    /// Load the item's source data. Failure rejects every requested target.
    async fn load(&self, item: &ItemName) -> Result<LoadedPayload, BuildError>;

    /// Build the loaded item for one target. Failures are reported in the
    /// returned build, never as an error.
    async fn save(&self, item: &ItemName, loaded: &LoadedPayload, target: &TargetName)
        -> TargetBuild;
}

/// Outcome of building one item outside the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub name: ItemName,
    pub suppress_reason: Option<String>,
    pub builds: Vec<TargetBuild>,
}

/// Load and save an item for every target in one go.
///
/// Used by remote workers, which hold no store of their own.
pub async fn build_item<E: BuildExecutor + ?Sized>(
    executor: &E,
    name: &ItemName,
    targets: &BTreeSet<TargetName>,
) -> ItemReport {
    if let Some(reason) = executor.suppress_reason(name) {
        return ItemReport {
            name: name.clone(),
            suppress_reason: Some(reason),
            builds: Vec::new(),
        };
    }

    let builds = match executor.load(name).await {
        Ok(loaded) => {
            let mut builds = Vec::with_capacity(targets.len());
            for target in targets {
                builds.push(executor.save(name, &loaded, target).await);
            }
            builds
        }
        Err(e) => {
            warn!(item = %name, error = %e, "load failed, rejecting item");
            let message = e.to_string();
            targets
                .iter()
                .map(|target| TargetBuild::failed(target.clone(), message.clone()))
                .collect()
        }
    };
    ItemReport {
        name: name.clone(),
        suppress_reason: None,
        builds,
    }
}

#[cfg(test)]
#[path = "../executor_tests.rs"]
mod tests;
