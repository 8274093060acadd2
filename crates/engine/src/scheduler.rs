// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Choosing the local scheduler's next step

use cook_core::{ItemId, ItemState};
use cook_storage::WorkItemStore;

/// What the local scheduler should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// Build the next missing target of an item in `LoadReady` or `Save`.
    Save(ItemId),
    /// Load an item in `LoadPrepare`.
    Load(ItemId),
    /// Pop and distribute a batch of requests.
    Request,
    /// Nothing local to do but work is still in flight elsewhere.
    YieldTick,
    /// Nothing in progress at all.
    Done,
}

/// Pick the next action.
///
/// Urgent work first (save, then load, then request), then requests, saves
/// and loads in that order.
pub fn decide_next_action(store: &WorkItemStore) -> SchedulerAction {
    if let Some(id) = urgent_front(store, ItemState::Save)
        .or_else(|| urgent_front(store, ItemState::LoadReady))
    {
        return SchedulerAction::Save(id);
    }
    if let Some(id) = urgent_front(store, ItemState::LoadPrepare) {
        return SchedulerAction::Load(id);
    }
    if store.request_queue().num_queued() > 0 {
        // Urgent requests are popped first by the queue itself.
        return SchedulerAction::Request;
    }
    if let Some(id) = store
        .front(ItemState::Save)
        .or_else(|| store.front(ItemState::LoadReady))
    {
        return SchedulerAction::Save(id);
    }
    if let Some(id) = store.front(ItemState::LoadPrepare) {
        return SchedulerAction::Load(id);
    }
    if store.monitor().num_in_progress() > 0 {
        SchedulerAction::YieldTick
    } else {
        SchedulerAction::Done
    }
}

/// Urgent items are kept at the front of their state queue.
fn urgent_front(store: &WorkItemStore, state: ItemState) -> Option<ItemId> {
    if store.monitor().num_urgent_in(state) == 0 {
        return None;
    }
    let id = store.front(state)?;
    store
        .get(id)
        .filter(|item| item.is_urgent())
        .map(|_| id)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
