// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{CompletionCallback, ItemCompletion, TargetName};

/// Build a target set from string literals.
pub fn targets(names: &[&str]) -> BTreeSet<TargetName> {
    names.iter().map(|n| TargetName::new(*n)).collect()
}

/// Collects every completion delivered to callbacks created from it.
#[derive(Debug, Clone, Default)]
pub struct CompletionLog {
    entries: Arc<Mutex<Vec<ItemCompletion>>>,
}

impl CompletionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A callback that appends its completion to this log.
    pub fn callback(&self) -> CompletionCallback {
        let entries = Arc::clone(&self.entries);
        Box::new(move |completion: &ItemCompletion| entries.lock().push(completion.clone()))
    }

    pub fn entries(&self) -> Vec<ItemCompletion> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of completions recorded for the named item.
    pub fn count_for(&self, name: &str) -> usize {
        self.entries.lock().iter().filter(|c| c.name == name).count()
    }
}
