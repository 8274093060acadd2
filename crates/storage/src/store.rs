// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work item store: items, per-state containers, and the lifecycle state machine.
//!
//! The store is owned by the single scheduler loop and mutated only from it,
//! so it carries no internal locking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use cook_core::{
    CompletionCallback, CookOutcome, ItemCompletion, ItemId, ItemName, ItemState, TargetBuild,
    TargetName, TargetResult, WorkerId,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::monitor::Monitor;
use crate::path::normalize_file_path;
use crate::queue::{ItemQueue, RequestQueue};

/// Loaded representation of an item, produced by the build collaborator and
/// cached while the item sits in `LoadReady`/`Save`.
pub type LoadedPayload = serde_json::Value;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown work item {0}")]
    UnknownItem(ItemId),

    #[error("{name} is already in progress ({state})")]
    AlreadyInProgress { name: ItemName, state: ItemState },

    #[error("{name} is not in progress")]
    NotInProgress { name: ItemName },

    #[error("{name}: request names no targets")]
    EmptyRequest { name: ItemName },

    #[error("{name}: invalid transition {from} -> {to}")]
    InvalidTransition {
        name: ItemName,
        from: ItemState,
        to: ItemState,
    },

    #[error("{name} is not waiting in the request state")]
    NotRequested { name: ItemName },

    #[error("{name} is not assigned to a remote worker")]
    NotRemote { name: ItemName },

    #[error("{name} is not assigned to {worker}")]
    NotAssignedTo { name: ItemName, worker: WorkerId },
}

/// One unit of buildable content.
pub struct WorkItem {
    name: ItemName,
    file_path: PathBuf,
    requested: BTreeSet<TargetName>,
    completed: BTreeMap<TargetName, TargetResult>,
    state: ItemState,
    urgent: bool,
    assignment: Option<WorkerId>,
    callback: Option<CompletionCallback>,
    loaded: Option<LoadedPayload>,
    builds: Vec<TargetBuild>,
}

impl WorkItem {
    fn new(name: ItemName) -> Self {
        let file_path = normalize_file_path(name.as_str());
        Self {
            name,
            file_path,
            requested: BTreeSet::new(),
            completed: BTreeMap::new(),
            state: ItemState::Idle,
            urgent: false,
            assignment: None,
            callback: None,
            loaded: None,
            builds: Vec::new(),
        }
    }

    pub fn name(&self) -> &ItemName {
        &self.name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.is_in_progress()
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    pub fn assignment(&self) -> Option<WorkerId> {
        self.assignment
    }

    pub fn requested_targets(&self) -> &BTreeSet<TargetName> {
        &self.requested
    }

    pub fn completed_targets(&self) -> &BTreeMap<TargetName, TargetResult> {
        &self.completed
    }

    pub fn loaded(&self) -> Option<&LoadedPayload> {
        self.loaded.as_ref()
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// True when every target in `targets` has a recorded result.
    /// Failed results only count when `include_failed` is set.
    pub fn has_all_completed<'a>(
        &self,
        targets: impl IntoIterator<Item = &'a TargetName>,
        include_failed: bool,
    ) -> bool {
        targets.into_iter().all(|target| match self.completed.get(target) {
            Some(TargetResult::Succeeded) => true,
            Some(TargetResult::Failed) => include_failed,
            None => false,
        })
    }

    /// Requested targets that have no recorded result yet.
    pub fn missing_targets(&self) -> Vec<TargetName> {
        self.requested
            .iter()
            .filter(|target| !self.completed.contains_key(*target))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("urgent", &self.urgent)
            .field("assignment", &self.assignment)
            .field("requested", &self.requested)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

/// What happened to an item after a remote worker reported its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteResolution {
    /// Every requested target has a result; the item returned to `Idle`.
    Completed,
    /// Targets were added while the item was remote; it is queued again.
    Requeued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Back,
    Front,
}

/// Authoritative collection of work items and their lifecycle queues.
#[derive(Default)]
pub struct WorkItemStore {
    items: Vec<WorkItem>,
    by_name: HashMap<ItemName, ItemId>,
    by_file: HashMap<PathBuf, ItemId>,
    requests: RequestQueue,
    load_prepare: ItemQueue,
    load_ready: ItemQueue,
    save: ItemQueue,
    monitor: Monitor,
}

impl WorkItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- lookup ---------------------------------------------------------------

    /// Return the existing item for `name` or allocate a new idle one.
    pub fn find_or_create(&mut self, name: impl Into<ItemName>) -> ItemId {
        let name = name.into();
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = ItemId(self.items.len() as u32);
        let item = WorkItem::new(name.clone());
        self.by_file.entry(item.file_path.clone()).or_insert(id);
        self.items.push(item);
        self.by_name.insert(name, id);
        id
    }

    pub fn find(&self, name: &str) -> Option<ItemId> {
        self.by_name.get(name).copied()
    }

    pub fn find_by_file(&self, path: &Path) -> Option<ItemId> {
        self.by_file.get(path).copied()
    }

    /// Make `path` resolve to `id` (e.g. after the item was found under a
    /// redirected file name).
    pub fn register_file_alias(
        &mut self,
        id: ItemId,
        path: impl AsRef<Path>,
    ) -> Result<(), StoreError> {
        self.item(id)?;
        let normalized = normalize_file_path(&path.as_ref().to_string_lossy());
        self.by_file.insert(normalized, id);
        Ok(())
    }

    pub fn get(&self, id: ItemId) -> Option<&WorkItem> {
        self.items.get(id.index())
    }

    pub fn item(&self, id: ItemId) -> Result<&WorkItem, StoreError> {
        self.items.get(id.index()).ok_or(StoreError::UnknownItem(id))
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut WorkItem, StoreError> {
        self.items
            .get_mut(id.index())
            .ok_or(StoreError::UnknownItem(id))
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &WorkItem)> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| (ItemId(i as u32), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn request_queue(&self) -> &RequestQueue {
        &self.requests
    }

    /// Number of items held in the container for `state`.
    pub fn queue_len(&self, state: ItemState) -> usize {
        match state {
            ItemState::Idle => 0,
            ItemState::Request => self.requests.len(),
            ItemState::LoadPrepare => self.load_prepare.len(),
            ItemState::LoadReady => self.load_ready.len(),
            ItemState::Save => self.save.len(),
        }
    }

    /// Next item waiting in a `LoadPrepare`, `LoadReady` or `Save` queue.
    pub fn front(&self, state: ItemState) -> Option<ItemId> {
        match state {
            ItemState::LoadPrepare => self.load_prepare.front(),
            ItemState::LoadReady => self.load_ready.front(),
            ItemState::Save => self.save.front(),
            ItemState::Idle | ItemState::Request => None,
        }
    }

    pub fn has_all_completed(
        &self,
        id: ItemId,
        targets: &BTreeSet<TargetName>,
        include_failed: bool,
    ) -> Result<bool, StoreError> {
        Ok(self.item(id)?.has_all_completed(targets, include_failed))
    }

    // -- requests -------------------------------------------------------------

    /// Start a request for an idle item.
    ///
    /// Fails without side effects when the item is already in progress.
    pub fn set_request(
        &mut self,
        id: ItemId,
        targets: BTreeSet<TargetName>,
        urgent: bool,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), StoreError> {
        let item = self.item_mut(id)?;
        if item.is_in_progress() {
            warn!(item = %item.name, state = %item.state, "set_request ignored: item already in progress");
            return Err(StoreError::AlreadyInProgress {
                name: item.name.clone(),
                state: item.state,
            });
        }
        if targets.is_empty() {
            warn!(item = %item.name, "set_request ignored: no targets");
            return Err(StoreError::EmptyRequest {
                name: item.name.clone(),
            });
        }
        item.requested = targets;
        item.urgent = urgent;
        item.callback = on_complete;
        item.assignment = None;
        item.builds.clear();
        self.move_to(id, ItemState::Request, Placement::Back)
    }

    /// Add targets (and optionally urgency and a callback) to an item's
    /// request, starting one if the item is idle.
    ///
    /// Repeated calls compose: the requested set is the union of every target
    /// asked for since the item left `Idle`, and every supplied callback fires.
    pub fn update_request(
        &mut self,
        id: ItemId,
        targets: BTreeSet<TargetName>,
        urgent: bool,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), StoreError> {
        if !self.item(id)?.is_in_progress() {
            return self.set_request(id, targets, urgent, on_complete);
        }

        let item = self.item_mut(id)?;
        let mut added_unbuilt = false;
        for target in targets {
            if !item.completed.contains_key(&target) && !item.requested.contains(&target) {
                added_unbuilt = true;
            }
            item.requested.insert(target);
        }
        if let Some(next) = on_complete {
            item.callback = Some(match item.callback.take() {
                Some(prev) => Box::new(move |completion: &ItemCompletion| {
                    prev(completion);
                    next(completion);
                }),
                None => next,
            });
        }
        let state = item.state;
        if urgent && !item.urgent {
            item.urgent = true;
            self.monitor.on_promoted(state);
            match state {
                ItemState::Request => self.requests.promote(id),
                ItemState::LoadPrepare => jump_queue(&mut self.load_prepare, id),
                ItemState::LoadReady => jump_queue(&mut self.load_ready, id),
                ItemState::Save => jump_queue(&mut self.save, id),
                ItemState::Idle => {}
            }
        }

        if added_unbuilt && state == ItemState::Save {
            debug!(item = %self.item(id)?.name, "new targets after save started, demoting to load_ready");
            self.move_to(id, ItemState::LoadReady, Placement::Front)?;
        }
        Ok(())
    }

    /// Pop the next queued request, urgent sub-queue first.
    ///
    /// The popped item stays in the `Request` state; the caller must place it
    /// (transition, assign to a worker, complete, or return it) before the
    /// end of the tick.
    pub fn pop_next_request(&mut self) -> Option<ItemId> {
        self.requests.pop()
    }

    // -- transitions ----------------------------------------------------------

    /// Move an item along the state machine.
    ///
    /// Allowed moves: the forward chain `Idle -> Request -> LoadPrepare ->
    /// LoadReady -> Save -> Idle`, any in-progress state back to `Request`,
    /// and `Save -> LoadReady`.
    pub fn transition(&mut self, id: ItemId, next: ItemState) -> Result<(), StoreError> {
        let item = self.item(id)?;
        let from = item.state;
        let allowed = match (from, next) {
            (ItemState::Idle, ItemState::Request) => !item.requested.is_empty(),
            (ItemState::Request, ItemState::LoadPrepare)
            | (ItemState::LoadPrepare, ItemState::LoadReady)
            | (ItemState::LoadReady, ItemState::Save)
            | (ItemState::Save, ItemState::LoadReady)
            | (ItemState::Save, ItemState::Idle) => true,
            (from, ItemState::Request) => from.is_in_progress(),
            _ => false,
        };
        if !allowed {
            return Err(StoreError::InvalidTransition {
                name: item.name.clone(),
                from,
                to: next,
            });
        }
        match next {
            ItemState::Idle => self.complete_from_results(id),
            ItemState::Request if from.is_in_progress() => self.return_to_request(id),
            ItemState::LoadPrepare => {
                let item = self.item_mut(id)?;
                if item.assignment.is_none() {
                    item.assignment = Some(WorkerId::Local);
                }
                self.move_to(id, next, Placement::Back)
            }
            _ => self.move_to(id, next, Placement::Back),
        }
    }

    /// Mark a requested item as being built by `worker`.
    ///
    /// Remote assignments park the item in the request container's assigned
    /// set until results arrive or the assignment is cancelled.
    pub fn assign_to_worker(&mut self, id: ItemId, worker: WorkerId) -> Result<(), StoreError> {
        let item = self.item(id)?;
        if item.state != ItemState::Request || self.requests.is_assigned(id) {
            return Err(StoreError::NotRequested {
                name: item.name.clone(),
            });
        }
        if let WorkerId::Remote { .. } = worker {
            self.requests.mark_assigned(id);
        }
        self.item_mut(id)?.assignment = Some(worker);
        Ok(())
    }

    /// Cancel whatever is happening to an in-progress item and put it back
    /// at the front of the request queue with no worker assignment.
    pub fn return_to_request(&mut self, id: ItemId) -> Result<(), StoreError> {
        let item = self.item_mut(id)?;
        if !item.is_in_progress() {
            return Err(StoreError::NotInProgress {
                name: item.name.clone(),
            });
        }
        item.assignment = None;
        self.move_to(id, ItemState::Request, Placement::Front)
    }

    /// Cache the collaborator's loaded payload on an item being built.
    pub fn set_loaded(&mut self, id: ItemId, payload: LoadedPayload) -> Result<(), StoreError> {
        let item = self.item_mut(id)?;
        if !item.is_in_progress() {
            return Err(StoreError::NotInProgress {
                name: item.name.clone(),
            });
        }
        item.loaded = Some(payload);
        Ok(())
    }

    // -- results --------------------------------------------------------------

    /// Record the result of one (item, target) build.
    pub fn record_build(&mut self, id: ItemId, build: TargetBuild) -> Result<(), StoreError> {
        let item = self.item_mut(id)?;
        let result = build.result();
        let previous = item.completed.insert(build.target.clone(), result);
        item.builds.push(build);
        if let Some(previous) = previous {
            self.monitor.on_result_removed(previous);
        }
        self.monitor.on_result_added(result);
        Ok(())
    }

    /// Whether `worker` is the current owner of an in-progress item.
    pub fn is_assigned_to(&self, id: ItemId, worker: WorkerId) -> bool {
        self.get(id)
            .is_some_and(|item| item.is_in_progress() && item.assignment == Some(worker))
    }

    fn check_remote_owner(&self, id: ItemId, worker: WorkerId) -> Result<(), StoreError> {
        let item = self.item(id)?;
        if !matches!(worker, WorkerId::Remote { .. }) {
            return Err(StoreError::NotRemote {
                name: item.name.clone(),
            });
        }
        if !self.is_assigned_to(id, worker) {
            return Err(StoreError::NotAssignedTo {
                name: item.name.clone(),
                worker,
            });
        }
        Ok(())
    }

    /// Record results reported by the remote worker that owns an item.
    ///
    /// Completes the item when every requested target now has a result,
    /// otherwise returns it to the request queue for the missing targets.
    /// Results from any other worker are rejected untouched.
    pub fn record_remote_results(
        &mut self,
        id: ItemId,
        worker: WorkerId,
        builds: Vec<TargetBuild>,
    ) -> Result<RemoteResolution, StoreError> {
        self.check_remote_owner(id, worker)?;
        for build in builds {
            self.record_build(id, build)?;
        }
        let item = self.item(id)?;
        if item.has_all_completed(&item.requested, true) {
            self.complete_from_results(id)?;
            Ok(RemoteResolution::Completed)
        } else {
            debug!(item = %item.name, missing = ?item.missing_targets(), "remote results incomplete, requeueing");
            self.return_to_request(id)?;
            Ok(RemoteResolution::Requeued)
        }
    }

    /// Complete an item on behalf of the remote worker that owns it, for
    /// example when the worker decided to skip it.
    pub fn complete_remote(
        &mut self,
        id: ItemId,
        worker: WorkerId,
        outcome: CookOutcome,
    ) -> Result<(), StoreError> {
        self.check_remote_owner(id, worker)?;
        self.complete(id, outcome)
    }

    /// Complete an item with an outcome derived from its recorded results:
    /// `Succeeded` when every requested target succeeded, else `Failed`.
    pub fn complete_from_results(&mut self, id: ItemId) -> Result<(), StoreError> {
        let item = self.item(id)?;
        let outcome = if item.has_all_completed(&item.requested, false) {
            CookOutcome::Succeeded
        } else {
            CookOutcome::Failed
        };
        self.complete(id, outcome)
    }

    /// Return an in-progress item to `Idle`, firing its callback exactly once.
    pub fn complete(&mut self, id: ItemId, outcome: CookOutcome) -> Result<(), StoreError> {
        let item = self.item(id)?;
        if !item.is_in_progress() {
            return Err(StoreError::NotInProgress {
                name: item.name.clone(),
            });
        }
        self.move_to(id, ItemState::Idle, Placement::Back)?;

        let item = self.item_mut(id)?;
        item.requested.clear();
        item.urgent = false;
        item.assignment = None;
        let completion = ItemCompletion {
            name: item.name.clone(),
            outcome,
            builds: std::mem::take(&mut item.builds),
        };
        let callback = item.callback.take();
        debug!(item = %completion.name, outcome = ?completion.outcome, "item completed");
        if let Some(callback) = callback {
            callback(&completion);
        }
        Ok(())
    }

    // -- session --------------------------------------------------------------

    /// Drop `target` from every item. In-progress items left with nothing
    /// requested complete as cancelled.
    pub fn remove_session_target(&mut self, target: &TargetName) {
        let mut emptied = Vec::new();
        for (index, item) in self.items.iter_mut().enumerate() {
            if let Some(result) = item.completed.remove(target) {
                self.monitor.on_result_removed(result);
            }
            if item.requested.remove(target) && item.requested.is_empty() {
                emptied.push(ItemId(index as u32));
            }
        }
        for id in emptied {
            if let Err(e) = self.complete(id, CookOutcome::Cancelled) {
                warn!(error = %e, "failed to cancel item after target removal");
            }
        }
    }

    /// Cancel every in-progress item. Completed results persist.
    ///
    /// Returns the number of items cancelled.
    pub fn end_session(&mut self) -> usize {
        let in_progress: Vec<ItemId> = self
            .items()
            .filter(|(_, item)| item.is_in_progress())
            .map(|(id, _)| id)
            .collect();
        let mut cancelled = 0;
        for id in in_progress {
            match self.complete(id, CookOutcome::Cancelled) {
                Ok(()) => cancelled += 1,
                Err(e) => warn!(error = %e, "failed to cancel item at session end"),
            }
        }
        cancelled
    }

    /// Forget every recorded result for one item.
    pub fn clear_completed(&mut self, id: ItemId) -> Result<(), StoreError> {
        let item = self.item_mut(id)?;
        for (_, result) in std::mem::take(&mut item.completed) {
            self.monitor.on_result_removed(result);
        }
        Ok(())
    }

    pub fn clear_all_completed(&mut self) {
        for item in &mut self.items {
            for (_, result) in std::mem::take(&mut item.completed) {
                self.monitor.on_result_removed(result);
            }
        }
    }

    // -- invariants -----------------------------------------------------------

    /// Check that every item sits in exactly the container matching its state
    /// and that the monitor agrees with a full recount.
    pub fn verify_invariants(&self) -> Result<(), String> {
        let mut recount = Monitor::default();
        for (id, item) in self.items() {
            recount.on_enter(item.state, item.urgent);
            for result in item.completed.values() {
                recount.on_result_added(*result);
            }
            let held_in: Vec<ItemState> = ItemState::IN_PROGRESS
                .into_iter()
                .filter(|&state| self.container_holds(state, id))
                .collect();
            match item.state {
                ItemState::Idle => {
                    if !held_in.is_empty() {
                        return Err(format!("{} is idle but queued in {:?}", item.name, held_in));
                    }
                    if !item.requested.is_empty() || item.assignment.is_some() || item.urgent {
                        return Err(format!("{} is idle but carries request data", item.name));
                    }
                }
                state => {
                    if held_in != [state] {
                        return Err(format!(
                            "{} is {} but held in {:?}",
                            item.name, state, held_in
                        ));
                    }
                    let remote = matches!(item.assignment, Some(WorkerId::Remote { .. }));
                    if remote != self.requests.is_assigned(id) {
                        return Err(format!(
                            "{} assignment {:?} disagrees with the assigned set",
                            item.name, item.assignment
                        ));
                    }
                }
            }
        }
        for (state, queue) in [
            (ItemState::LoadPrepare, &self.load_prepare),
            (ItemState::LoadReady, &self.load_ready),
            (ItemState::Save, &self.save),
        ] {
            for id in queue.iter() {
                match self.get(id) {
                    Some(item) if item.state == state => {}
                    Some(item) => {
                        return Err(format!("{} queue holds {} in {}", state, item.name, item.state))
                    }
                    None => return Err(format!("{state} queue holds unknown item {id}")),
                }
            }
        }
        if recount != self.monitor {
            return Err(format!(
                "monitor drifted: have {:?}, recount {:?}",
                self.monitor, recount
            ));
        }
        Ok(())
    }

    // -- internals ------------------------------------------------------------

    fn container_holds(&self, state: ItemState, id: ItemId) -> bool {
        match state {
            ItemState::Idle => false,
            ItemState::Request => self.requests.contains(id),
            ItemState::LoadPrepare => self.load_prepare.contains(id),
            ItemState::LoadReady => self.load_ready.contains(id),
            ItemState::Save => self.save.contains(id),
        }
    }

    fn move_to(
        &mut self,
        id: ItemId,
        next: ItemState,
        placement: Placement,
    ) -> Result<(), StoreError> {
        let item = self.item(id)?;
        let (prev, urgent) = (item.state, item.urgent);

        match prev {
            ItemState::Idle => {}
            ItemState::Request => {
                self.requests.remove(id);
            }
            ItemState::LoadPrepare => {
                self.load_prepare.remove(id);
            }
            ItemState::LoadReady => {
                self.load_ready.remove(id);
            }
            ItemState::Save => {
                self.save.remove(id);
            }
        }
        self.monitor.on_exit(prev, urgent);

        let item = self.item_mut(id)?;
        item.state = next;
        if matches!(
            next,
            ItemState::Idle | ItemState::Request | ItemState::LoadPrepare
        ) {
            item.loaded = None;
        }

        // Urgent items jump the per-state queues; the request queue has its
        // own urgent sub-queue instead.
        let front = placement == Placement::Front || urgent;
        match next {
            ItemState::Idle => {}
            ItemState::Request => {
                if placement == Placement::Front {
                    self.requests.push_front(id, urgent);
                } else {
                    self.requests.push(id, urgent);
                }
            }
            ItemState::LoadPrepare => push(&mut self.load_prepare, id, front),
            ItemState::LoadReady => push(&mut self.load_ready, id, front),
            ItemState::Save => push(&mut self.save, id, front),
        }
        self.monitor.on_enter(next, urgent);
        Ok(())
    }
}

fn jump_queue(queue: &mut ItemQueue, id: ItemId) {
    if queue.remove(id) {
        queue.push_front(id);
    }
}

fn push(queue: &mut ItemQueue, id: ItemId, front: bool) {
    if front {
        queue.push_front(id);
    } else {
        queue.push_back(id);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
