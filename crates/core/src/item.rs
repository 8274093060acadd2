// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item lifecycle vocabulary: states, per-target results, completions.

use serde::{Deserialize, Serialize};

use crate::id::{ItemName, TargetName};

/// Lifecycle state of a work item.
///
/// `Idle -> Request -> LoadPrepare -> LoadReady -> Save -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Idle,
    Request,
    LoadPrepare,
    LoadReady,
    Save,
}

impl ItemState {
    /// All in-progress states, in pipeline order.
    pub const IN_PROGRESS: [ItemState; 4] = [
        ItemState::Request,
        ItemState::LoadPrepare,
        ItemState::LoadReady,
        ItemState::Save,
    ];

    pub fn is_in_progress(self) -> bool {
        self != ItemState::Idle
    }

    /// The state that follows this one on the success path.
    pub fn next(self) -> ItemState {
        match self {
            ItemState::Idle => ItemState::Request,
            ItemState::Request => ItemState::LoadPrepare,
            ItemState::LoadPrepare => ItemState::LoadReady,
            ItemState::LoadReady => ItemState::Save,
            ItemState::Save => ItemState::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemState::Idle => "idle",
            ItemState::Request => "request",
            ItemState::LoadPrepare => "load_prepare",
            ItemState::LoadReady => "load_ready",
            ItemState::Save => "save",
        }
    }
}

impl std::fmt::Display for ItemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result of building one item for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetResult {
    Succeeded,
    Failed,
}

impl TargetResult {
    pub fn from_success(succeeded: bool) -> Self {
        if succeeded {
            TargetResult::Succeeded
        } else {
            TargetResult::Failed
        }
    }
}

/// Output of a single (item, target) build, as reported by whoever built it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBuild {
    pub target: TargetName,
    pub succeeded: bool,
    #[serde(default)]
    pub build_id: Option<String>,
    #[serde(default)]
    pub dependency_digest: Option<String>,
    #[serde(default)]
    pub side_messages: Vec<String>,
}

impl TargetBuild {
    /// A failed build with a single explanatory message.
    pub fn failed(target: TargetName, message: impl Into<String>) -> Self {
        Self {
            target,
            succeeded: false,
            build_id: None,
            dependency_digest: None,
            side_messages: vec![message.into()],
        }
    }

    pub fn result(&self) -> TargetResult {
        TargetResult::from_success(self.succeeded)
    }
}

/// Why an item left the in-progress states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CookOutcome {
    /// Every requested target built successfully.
    Succeeded,
    /// At least one requested target failed.
    Failed,
    /// Every requested target already had a recorded result.
    AlreadyCooked,
    /// The item was deliberately not built.
    Skipped { reason: String },
    /// The request was withdrawn before the item finished.
    Cancelled,
}

/// Payload handed to an item's completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCompletion {
    pub name: ItemName,
    pub outcome: CookOutcome,
    /// Builds performed for this request (empty when nothing was built).
    pub builds: Vec<TargetBuild>,
}

/// One-shot callback invoked when an item next leaves the in-progress states.
pub type CompletionCallback = Box<dyn FnOnce(&ItemCompletion) + Send>;

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
