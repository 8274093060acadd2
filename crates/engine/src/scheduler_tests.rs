// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cook_core::test_support::targets;
use cook_core::WorkerId;

fn request(store: &mut WorkItemStore, name: &str, urgent: bool) -> ItemId {
    let id = store.find_or_create(name);
    store.set_request(id, targets(&["a"]), urgent, None).unwrap();
    id
}

fn to_state(store: &mut WorkItemStore, id: ItemId, state: ItemState) {
    assert_eq!(store.pop_next_request(), Some(id));
    let mut current = ItemState::Request;
    while current != state {
        current = current.next();
        store.transition(id, current).unwrap();
    }
}

#[test]
fn empty_store_is_done() {
    assert_eq!(decide_next_action(&WorkItemStore::new()), SchedulerAction::Done);
}

#[test]
fn queued_requests_come_before_normal_saves_and_loads() {
    let mut store = WorkItemStore::new();
    let saving = request(&mut store, "saving", false);
    to_state(&mut store, saving, ItemState::Save);
    let loading = request(&mut store, "loading", false);
    to_state(&mut store, loading, ItemState::LoadPrepare);
    request(&mut store, "queued", false);

    assert_eq!(decide_next_action(&store), SchedulerAction::Request);
}

#[test]
fn normal_order_is_request_then_save_then_load() {
    let mut store = WorkItemStore::new();
    let loading = request(&mut store, "loading", false);
    to_state(&mut store, loading, ItemState::LoadPrepare);
    assert_eq!(decide_next_action(&store), SchedulerAction::Load(loading));

    let ready = request(&mut store, "ready", false);
    to_state(&mut store, ready, ItemState::LoadReady);
    assert_eq!(decide_next_action(&store), SchedulerAction::Save(ready));

    let saving = request(&mut store, "saving", false);
    to_state(&mut store, saving, ItemState::Save);
    assert_eq!(decide_next_action(&store), SchedulerAction::Save(saving));
}

#[test]
fn urgent_save_beats_urgent_load_beats_requests() {
    let mut store = WorkItemStore::new();
    request(&mut store, "normal", false);
    let urgent_load = request(&mut store, "urgent_load", true);
    // Urgent sub-queue pops first, so pop order is urgent_load then normal.
    to_state(&mut store, urgent_load, ItemState::LoadPrepare);
    assert_eq!(decide_next_action(&store), SchedulerAction::Load(urgent_load));

    let urgent_save = request(&mut store, "urgent_save", true);
    to_state(&mut store, urgent_save, ItemState::Save);
    assert_eq!(decide_next_action(&store), SchedulerAction::Save(urgent_save));
}

#[test]
fn promoted_load_is_picked_over_requests() {
    let mut store = WorkItemStore::new();
    let loading = request(&mut store, "loading", false);
    to_state(&mut store, loading, ItemState::LoadPrepare);
    request(&mut store, "queued", false);
    assert_eq!(decide_next_action(&store), SchedulerAction::Request);

    store.update_request(loading, targets(&["a"]), true, None).unwrap();
    assert_eq!(decide_next_action(&store), SchedulerAction::Load(loading));
}

#[test]
fn remote_work_in_flight_yields() {
    let mut store = WorkItemStore::new();
    let id = request(&mut store, "remote", false);
    assert_eq!(store.pop_next_request(), Some(id));
    store.assign_to_worker(id, WorkerId::remote(0)).unwrap();

    assert_eq!(decide_next_action(&store), SchedulerAction::YieldTick);
}
