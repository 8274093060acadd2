// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime that owns the store and drives cooking one tick at a time

use std::collections::BTreeSet;
use std::time::Duration;

use cook_core::{
    format_duration, Clock, CompletionCallback, CookOutcome, ItemId, ItemName, ItemState,
    TargetBuild, TargetName, WorkerId,
};
use cook_storage::{StoreError, WorkItemStore};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::distributor::WorkDistributor;
use crate::error::RuntimeError;
use crate::executor::BuildExecutor;
use crate::scheduler::{decide_next_action, SchedulerAction};

/// Runtime tuning
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum requests popped and distributed per tick.
    pub request_batch_size: usize,
    /// Sleep between ticks while only remote work is in flight.
    pub idle_poll: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_batch_size: 256,
            idle_poll: Duration::from_millis(10),
        }
    }
}

/// A request to cook one item.
pub struct CookRequest {
    pub name: ItemName,
    pub targets: BTreeSet<TargetName>,
    pub urgent: bool,
    pub on_complete: Option<CompletionCallback>,
}

impl std::fmt::Debug for CookRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookRequest")
            .field("name", &self.name)
            .field("targets", &self.targets)
            .field("urgent", &self.urgent)
            .finish_non_exhaustive()
    }
}

/// Cloneable sender for cook requests from outside the runtime's loop.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    tx: mpsc::UnboundedSender<CookRequest>,
}

impl RuntimeHandle {
    pub fn request(&self, request: CookRequest) -> Result<(), RuntimeError> {
        self.tx.send(request).map_err(|_| RuntimeError::Closed)
    }

    /// Convenience wrapper for [`RuntimeHandle::request`].
    pub fn cook(
        &self,
        name: impl Into<ItemName>,
        targets: BTreeSet<TargetName>,
        urgent: bool,
        on_complete: Option<CompletionCallback>,
    ) -> Result<(), RuntimeError> {
        self.request(CookRequest {
            name: name.into(),
            targets,
            urgent,
            on_complete,
        })
    }
}

/// Single owner of the work item store, the distributor and the executor.
pub struct Runtime<D, E, C: Clock> {
    store: WorkItemStore,
    distributor: D,
    executor: E,
    clock: C,
    config: RuntimeConfig,
    requests: mpsc::UnboundedReceiver<CookRequest>,
    handle: RuntimeHandle,
}

impl<D, E, C> Runtime<D, E, C>
where
    D: WorkDistributor,
    E: BuildExecutor,
    C: Clock,
{
    pub fn new(distributor: D, executor: E, clock: C, config: RuntimeConfig) -> Self {
        let (tx, requests) = mpsc::unbounded_channel();
        Self {
            store: WorkItemStore::new(),
            distributor,
            executor,
            clock,
            config,
            requests,
            handle: RuntimeHandle { tx },
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn store(&self) -> &WorkItemStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut WorkItemStore {
        &mut self.store
    }

    pub fn distributor(&self) -> &D {
        &self.distributor
    }

    pub fn distributor_mut(&mut self) -> &mut D {
        &mut self.distributor
    }

    /// Apply a request immediately, bypassing the channel.
    pub fn submit(&mut self, request: CookRequest) {
        let CookRequest {
            name,
            targets,
            urgent,
            on_complete,
        } = request;
        let id = self.store.find_or_create(name.clone());

        // Urgent work is pulled back from remote workers and built here.
        if urgent
            && matches!(
                self.store.get(id).and_then(|item| item.assignment()),
                Some(WorkerId::Remote { .. })
            )
            && self.distributor.remove_from_worker(&mut self.store, id)
        {
            debug!(item = %name, "reclaimed urgent item from remote worker");
        }

        if let Err(e) = self.store.update_request(id, targets, urgent, on_complete) {
            warn!(item = %name, error = %e, "cook request rejected");
        }
    }

    fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            self.submit(request);
        }
    }

    /// Run one scheduler step and pump the distributor once.
    pub async fn tick(&mut self) -> Result<SchedulerAction, RuntimeError> {
        self.drain_requests();
        let action = decide_next_action(&self.store);
        match action {
            SchedulerAction::Request => self.process_requests()?,
            SchedulerAction::Load(id) => self.load(id).await?,
            SchedulerAction::Save(id) => self.save(id).await?,
            SchedulerAction::YieldTick | SchedulerAction::Done => {}
        }
        let local_idle = matches!(action, SchedulerAction::YieldTick | SchedulerAction::Done);
        self.distributor.tick(&mut self.store, local_idle);
        Ok(action)
    }

    /// Tick until nothing is in progress and no request is waiting.
    pub async fn run_until_idle(&mut self) -> Result<(), RuntimeError> {
        let started = self.clock.now();
        loop {
            match self.tick().await? {
                SchedulerAction::Done => break,
                SchedulerAction::YieldTick => tokio::time::sleep(self.config.idle_poll).await,
                _ => tokio::task::yield_now().await,
            }
        }
        let monitor = self.store.monitor();
        info!(
            succeeded = monitor.num_succeeded(),
            failed = monitor.num_failed(),
            elapsed = %format_duration(self.clock.now().saturating_duration_since(started)),
            "cook idle"
        );
        Ok(())
    }

    /// Shut down remote distribution and cancel everything still in progress.
    ///
    /// Returns the number of items cancelled.
    pub async fn end_session(&mut self) -> usize {
        self.distributor.shutdown_session(&mut self.store).await;
        let cancelled = self.store.end_session();
        if cancelled > 0 {
            info!(cancelled, "session ended with items in progress");
        }
        cancelled
    }

    fn process_requests(&mut self) -> Result<(), StoreError> {
        let mut batch = Vec::new();
        while batch.len() < self.config.request_batch_size {
            let Some(id) = self.store.pop_next_request() else {
                break;
            };
            let item = self.store.item(id)?;
            if item.has_all_completed(item.requested_targets(), true) {
                debug!(item = %item.name(), "already cooked");
                self.store.complete(id, CookOutcome::AlreadyCooked)?;
                continue;
            }
            if let Some(reason) = self.executor.suppress_reason(item.name()) {
                info!(item = %item.name(), %reason, "skipping item");
                self.store.complete(id, CookOutcome::Skipped { reason })?;
                continue;
            }
            if !self.distributor.can_build_remotely(item.requested_targets()) {
                debug!(item = %item.name(), "targets not built remotely, keeping local");
                self.store.transition(id, ItemState::LoadPrepare)?;
                continue;
            }
            batch.push((id, item.name().clone()));
        }
        if batch.is_empty() {
            return Ok(());
        }

        let decisions = self.distributor.assign_requests(&batch);
        for (n, (id, name)) in batch.into_iter().enumerate() {
            match decisions.get(n).copied().unwrap_or(WorkerId::Local) {
                WorkerId::Local => self.store.transition(id, ItemState::LoadPrepare)?,
                remote => {
                    debug!(item = %name, worker = %remote, "assigned to remote worker");
                    self.store.assign_to_worker(id, remote)?;
                }
            }
        }
        Ok(())
    }

    async fn load(&mut self, id: ItemId) -> Result<(), StoreError> {
        let item = self.store.item(id)?;
        let name = item.name().clone();
        match self.executor.load(&name).await {
            Ok(payload) => {
                self.store.set_loaded(id, payload)?;
                self.store.transition(id, ItemState::LoadReady)?;
            }
            Err(e) => {
                warn!(item = %name, error = %e, "load failed, rejecting item");
                let message = e.to_string();
                for target in self.store.item(id)?.missing_targets() {
                    self.store
                        .record_build(id, TargetBuild::failed(target, message.clone()))?;
                }
                self.store.complete(id, CookOutcome::Failed)?;
            }
        }
        Ok(())
    }

    async fn save(&mut self, id: ItemId) -> Result<(), StoreError> {
        if self.store.item(id)?.state() == ItemState::LoadReady {
            self.store.transition(id, ItemState::Save)?;
        }
        let item = self.store.item(id)?;
        let Some(target) = item.missing_targets().into_iter().next() else {
            return self.store.transition(id, ItemState::Idle);
        };
        let name = item.name().clone();
        let loaded = item.loaded().cloned().unwrap_or(Value::Null);

        let build = self.executor.save(&name, &loaded, &target).await;
        for message in &build.side_messages {
            info!(item = %name, target = %target, "{}", message);
        }
        if !build.succeeded {
            warn!(item = %name, target = %target, "target build failed");
        }
        self.store.record_build(id, build)
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
