// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and slot index recycling.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Who builds a work item: the director itself or one of its remote workers.
///
/// Serializes as a tagged enum:
/// - `{"type": "local"}`
/// - `{"type": "remote", "index": 2}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerId {
    Local,
    Remote { index: u32 },
}

impl WorkerId {
    pub fn remote(index: u32) -> Self {
        WorkerId::Remote { index }
    }

    pub fn is_local(self) -> bool {
        matches!(self, WorkerId::Local)
    }

    /// Remote slot index, if this is a remote worker.
    pub fn remote_index(self) -> Option<u32> {
        match self {
            WorkerId::Local => None,
            WorkerId::Remote { index } => Some(index),
        }
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerId::Local => f.write_str("local"),
            WorkerId::Remote { index } => write!(f, "remote-{}", index),
        }
    }
}

/// Dense allocator for remote worker slot indices.
///
/// Released indices are handed out again (lowest first) before any new,
/// larger index is minted, so the index space stays bounded by the peak
/// number of simultaneously live workers.
#[derive(Debug, Default)]
pub struct WorkerIndexPool {
    free: BTreeSet<u32>,
    next: u32,
}

impl WorkerIndexPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the lowest available index.
    pub fn allocate(&mut self) -> u32 {
        if let Some(index) = self.free.pop_first() {
            return index;
        }
        let index = self.next;
        self.next += 1;
        index
    }

    /// Return an index to the pool. Releasing an index that is not
    /// allocated is ignored.
    pub fn release(&mut self, index: u32) {
        if index >= self.next {
            return;
        }
        if index + 1 == self.next {
            self.next = index;
            // Shrink through any trailing run of free indices.
            while self.next > 0 && self.free.remove(&(self.next - 1)) {
                self.next -= 1;
            }
        } else {
            self.free.insert(index);
        }
    }

    /// Number of indices currently handed out.
    pub fn allocated(&self) -> usize {
        self.next as usize - self.free.len()
    }

    pub fn is_allocated(&self, index: u32) -> bool {
        index < self.next && !self.free.contains(&index)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
