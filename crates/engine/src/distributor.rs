// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seam between the local scheduler and whatever distributes work remotely.

use async_trait::async_trait;
use std::collections::BTreeSet;

use cook_core::{ItemId, ItemName, TargetName, WorkerId};
use cook_storage::WorkItemStore;

/// Decides who builds each request and keeps remote work flowing.
///
/// Driven from the runtime's single owner loop; no method may block except
/// [`WorkDistributor::shutdown_session`].
#[async_trait]
pub trait WorkDistributor: Send {
    /// One decision per input item, in input order. Remote decisions are
    /// already staged for transmission when this returns.
    fn assign_requests(&mut self, items: &[(ItemId, ItemName)]) -> Vec<WorkerId>;

    /// Whether remote workers build every target in `targets`. Requests
    /// that need anything else stay local.
    fn can_build_remotely(&self, _targets: &BTreeSet<TargetName>) -> bool {
        true
    }

    /// Take an item back from whichever remote worker holds it and return it
    /// to the request queue. False if no remote worker held it.
    fn remove_from_worker(&mut self, store: &mut WorkItemStore, id: ItemId) -> bool;

    /// Pump connections once. `local_idle` is true when the local scheduler
    /// found nothing to do this tick.
    fn tick(&mut self, store: &mut WorkItemStore, local_idle: bool);

    /// Stop all remote work and wait until every worker is gone.
    async fn shutdown_session(&mut self, store: &mut WorkItemStore);
}

/// Builds everything in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

#[async_trait]
impl WorkDistributor for LocalOnly {
    fn assign_requests(&mut self, items: &[(ItemId, ItemName)]) -> Vec<WorkerId> {
        vec![WorkerId::Local; items.len()]
    }

    fn remove_from_worker(&mut self, _store: &mut WorkItemStore, _id: ItemId) -> bool {
        false
    }

    fn tick(&mut self, _store: &mut WorkItemStore, _local_idle: bool) {}

    async fn shutdown_session(&mut self, _store: &mut WorkItemStore) {}
}
