// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-state containers for work items.

use std::collections::{BTreeSet, VecDeque};

use cook_core::ItemId;

/// FIFO container used by the `LoadPrepare`, `LoadReady` and `Save` states.
#[derive(Debug, Default)]
pub struct ItemQueue {
    items: VecDeque<ItemId>,
}

impl ItemQueue {
    pub fn push_back(&mut self, id: ItemId) {
        self.items.push_back(id);
    }

    pub fn push_front(&mut self, id: ItemId) {
        self.items.push_front(id);
    }

    pub fn front(&self) -> Option<ItemId> {
        self.items.front().copied()
    }

    pub fn remove(&mut self, id: ItemId) -> bool {
        match self.items.iter().position(|&queued| queued == id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().copied()
    }
}

/// Container for the `Request` state.
///
/// Items in the `Request` state live in exactly one of:
/// - the urgent sub-queue (served strictly first),
/// - the normal FIFO sub-queue,
/// - the popped set (handed to the scheduler, awaiting placement),
/// - the assigned set (mid-build on a remote worker).
#[derive(Debug, Default)]
pub struct RequestQueue {
    urgent: VecDeque<ItemId>,
    normal: VecDeque<ItemId>,
    popped: BTreeSet<ItemId>,
    assigned: BTreeSet<ItemId>,
}

impl RequestQueue {
    /// Enqueue at the back of the matching sub-queue.
    pub fn push(&mut self, id: ItemId, urgent: bool) {
        if urgent {
            self.urgent.push_back(id);
        } else {
            self.normal.push_back(id);
        }
    }

    /// Enqueue at the front of the matching sub-queue.
    pub fn push_front(&mut self, id: ItemId, urgent: bool) {
        if urgent {
            self.urgent.push_front(id);
        } else {
            self.normal.push_front(id);
        }
    }

    /// Pop the next queued request, urgent first. The item moves to the
    /// popped set until it is placed elsewhere.
    pub fn pop(&mut self) -> Option<ItemId> {
        let id = self
            .urgent
            .pop_front()
            .or_else(|| self.normal.pop_front())?;
        self.popped.insert(id);
        Some(id)
    }

    /// Move a queued or popped item into the assigned set.
    pub fn mark_assigned(&mut self, id: ItemId) -> bool {
        if self.remove(id) {
            self.assigned.insert(id);
            true
        } else {
            false
        }
    }

    /// Move a normal-priority queued item into the urgent sub-queue.
    pub fn promote(&mut self, id: ItemId) {
        if let Some(pos) = self.normal.iter().position(|&queued| queued == id) {
            self.normal.remove(pos);
            self.urgent.push_back(id);
        }
    }

    /// Remove an item from whichever sub-container holds it.
    pub fn remove(&mut self, id: ItemId) -> bool {
        if let Some(pos) = self.urgent.iter().position(|&queued| queued == id) {
            self.urgent.remove(pos);
            return true;
        }
        if let Some(pos) = self.normal.iter().position(|&queued| queued == id) {
            self.normal.remove(pos);
            return true;
        }
        self.popped.remove(&id) || self.assigned.remove(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.is_queued(id) || self.popped.contains(&id) || self.assigned.contains(&id)
    }

    pub fn is_queued(&self, id: ItemId) -> bool {
        self.urgent.contains(&id) || self.normal.contains(&id)
    }

    pub fn is_assigned(&self, id: ItemId) -> bool {
        self.assigned.contains(&id)
    }

    /// Number of items waiting to be popped.
    pub fn num_queued(&self) -> usize {
        self.urgent.len() + self.normal.len()
    }

    pub fn num_urgent_queued(&self) -> usize {
        self.urgent.len()
    }

    pub fn num_assigned(&self) -> usize {
        self.assigned.len()
    }

    /// Every item held in any sub-container.
    pub fn len(&self) -> usize {
        self.num_queued() + self.popped.len() + self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
