// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake build executor for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use cook_core::{ItemName, TargetBuild, TargetName};
use cook_storage::LoadedPayload;
use parking_lot::Mutex;

use super::BuildExecutor;
use crate::BuildError;

/// Recorded executor call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorCall {
    Load { item: ItemName },
    Save { item: ItemName, target: TargetName },
}

#[derive(Default)]
struct FakeExecutorState {
    calls: Vec<ExecutorCall>,
    failing_loads: HashSet<ItemName>,
    failing_saves: HashSet<(ItemName, TargetName)>,
    suppressed: HashMap<ItemName, String>,
}

/// In-memory executor: every load and save succeeds unless told otherwise.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    inner: Arc<Mutex<FakeExecutorState>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_load(&self, item: &str) {
        self.inner.lock().failing_loads.insert(ItemName::new(item));
    }

    pub fn fail_save(&self, item: &str, target: &str) {
        self.inner
            .lock()
            .failing_saves
            .insert((ItemName::new(item), TargetName::new(target)));
    }

    pub fn suppress(&self, item: &str, reason: &str) {
        self.inner
            .lock()
            .suppressed
            .insert(ItemName::new(item), reason.to_string());
    }

    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.inner.lock().calls.clone()
    }

    /// Targets saved for `item`, in call order.
    pub fn saves_for(&self, item: &str) -> Vec<TargetName> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ExecutorCall::Save { item: i, target } if i == item => Some(target.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn loads_for(&self, item: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ExecutorCall::Load { item: i } if i == item))
            .count()
    }
}

#[async_trait]
impl BuildExecutor for FakeExecutor {
    fn suppress_reason(&self, item: &ItemName) -> Option<String> {
        self.inner.lock().suppressed.get(item).cloned()
    }

    async fn load(&self, item: &ItemName) -> Result<LoadedPayload, BuildError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ExecutorCall::Load { item: item.clone() });
        if inner.failing_loads.contains(item) {
            return Err(BuildError::Load {
                item: item.clone(),
                message: "fake load failure".to_string(),
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
        let mut inner = self.inner.lock();
        inner.calls.push(ExecutorCall::Save {
            item: item.clone(),
            target: target.clone(),
        });
        if inner
            .failing_saves
            .contains(&(item.clone(), target.clone()))
        {
            return TargetBuild::failed(target.clone(), "fake save failure");
        }
        TargetBuild {
            target: target.clone(),
            succeeded: true,
            build_id: Some(format!("build-{}-{}", item, target)),
            dependency_digest: Some(format!("digest-{}", item)),
            side_messages: Vec::new(),
        }
    }
}
