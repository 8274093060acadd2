// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The director: a pool of worker proxies fed by striped load balancing.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cook_adapters::{Acceptor, LaunchCommand, ProcessLauncher};
use cook_core::{
    format_duration, Clock, ItemId, ItemName, TargetName, WorkerId, WorkerIndexPool,
    WorkerVisibility,
};
use cook_engine::{load_balance, WorkDistributor};
use cook_storage::WorkItemStore;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::protocol::{Message, WorkerConnect};
use crate::worker_server::{ConnectStatus, WorkerServer, WorkerServerConfig};

/// Director settings, resolved from configuration.
#[derive(Debug, Clone)]
pub struct DirectorOptions {
    /// Worker count at the start of every session.
    pub worker_count: u32,
    pub worker_executable: PathBuf,
    pub visibility: WorkerVisibility,
    /// Passed to workers that log to their own files.
    pub log_dir: Option<PathBuf>,
    pub no_timeouts: bool,
    pub shutdown_poll: Duration,
    pub stall_warn_after: Duration,
    pub stall_warn_interval: Duration,
    pub server: WorkerServerConfig,
}

impl Default for DirectorOptions {
    fn default() -> Self {
        Self {
            worker_count: 0,
            worker_executable: PathBuf::from("cook-worker"),
            visibility: WorkerVisibility::default(),
            log_dir: None,
            no_timeouts: false,
            shutdown_poll: Duration::from_millis(10),
            stall_warn_after: Duration::from_secs(60),
            stall_warn_interval: Duration::from_secs(60),
            server: WorkerServerConfig::default(),
        }
    }
}

/// An accepted socket that has not identified itself yet.
struct PendingConnection {
    connection: Connection,
    accepted_at: Instant,
}

/// Tracks how long the local scheduler has sat idle waiting on remote work.
#[derive(Debug, Default)]
struct StallMonitor {
    since: Option<Instant>,
    last_warning: Option<Instant>,
    warnings: usize,
}

impl StallMonitor {
    /// Returns the stall duration when a warning is due.
    fn observe(
        &mut self,
        stalled: bool,
        now: Instant,
        after: Duration,
        interval: Duration,
    ) -> Option<Duration> {
        if !stalled {
            self.since = None;
            self.last_warning = None;
            return None;
        }
        let since = *self.since.get_or_insert(now);
        let stalled_for = now.saturating_duration_since(since);
        if stalled_for < after {
            return None;
        }
        if let Some(last) = self.last_warning {
            if now.saturating_duration_since(last) < interval {
                return None;
            }
        }
        self.last_warning = Some(now);
        self.warnings += 1;
        Some(stalled_for)
    }
}

pub struct Director<C: Clock> {
    options: DirectorOptions,
    acceptor: Box<dyn Acceptor>,
    launcher: Box<dyn ProcessLauncher>,
    clock: C,
    workers: BTreeMap<u32, WorkerServer<C>>,
    shutting_down: Vec<WorkerServer<C>>,
    pending: Vec<PendingConnection>,
    indices: WorkerIndexPool,
    desired_workers: u32,
    stall: StallMonitor,
}

impl<C: Clock> Director<C> {
    pub fn new(
        options: DirectorOptions,
        acceptor: Box<dyn Acceptor>,
        launcher: Box<dyn ProcessLauncher>,
        clock: C,
    ) -> Self {
        let desired_workers = options.worker_count;
        Self {
            options,
            acceptor,
            launcher,
            clock,
            workers: BTreeMap::new(),
            shutting_down: Vec::new(),
            pending: Vec::new(),
            indices: WorkerIndexPool::new(),
            desired_workers,
            stall: StallMonitor::default(),
        }
    }

    pub fn listen_addr(&self) -> String {
        self.acceptor.local_addr()
    }

    /// Worker count for the current session.
    pub fn worker_count(&self) -> u32 {
        self.desired_workers
    }

    /// Change the session's worker count. New workers are created on the
    /// next assignment; surplus workers are asked to shut down on the next
    /// tick, highest index first.
    pub fn set_worker_count(&mut self, count: u32) {
        if count != self.desired_workers {
            info!(from = self.desired_workers, to = count, "worker count changed");
            self.desired_workers = count;
        }
    }

    /// Indices of workers that can take new work, ascending.
    pub fn active_indices(&self) -> Vec<u32> {
        self.workers
            .iter()
            .filter(|(_, server)| server.is_accepting_work())
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn worker_status(&self, index: u32) -> Option<ConnectStatus> {
        self.workers.get(&index).map(WorkerServer::status)
    }

    pub fn num_shutting_down(&self) -> usize {
        self.shutting_down.len()
    }

    pub fn num_pending_connections(&self) -> usize {
        self.pending.len()
    }

    /// Number of stall warnings emitted so far.
    pub fn stall_warnings(&self) -> usize {
        self.stall.warnings
    }

    /// Decide Local or a remote worker for each item, in input order, and
    /// stage remote items on their worker.
    pub fn assign_requests(&mut self, items: &[(ItemId, ItemName)]) -> Vec<WorkerId> {
        self.ensure_workers();
        let remotes = self.active_indices();
        let decisions = load_balance::striped(items.len(), &remotes);

        // An item is held by at most one worker; a fresh decision replaces
        // any stale copy still queued or in flight elsewhere.
        for (_, name) in items {
            for (index, server) in self.workers.iter_mut() {
                if server.abort_assignment(name).is_some() {
                    debug!(worker = *index, item = %name, "withdrew stale assignment");
                }
            }
        }

        let mut staged: BTreeMap<u32, Vec<(ItemId, ItemName)>> = BTreeMap::new();
        for (item, worker) in items.iter().zip(&decisions) {
            if let WorkerId::Remote { index } = worker {
                staged.entry(*index).or_default().push(item.clone());
            }
        }
        for (index, batch) in staged {
            if let Some(server) = self.workers.get_mut(&index) {
                debug!(worker = index, count = batch.len(), "staging assignments");
                server.append_assignments(batch);
            }
        }
        decisions
    }

    /// Take an item back from its remote worker and requeue it.
    pub fn remove_from_worker(&mut self, store: &mut WorkItemStore, id: ItemId) -> bool {
        let Some(item) = store.get(id) else {
            return false;
        };
        let Some(WorkerId::Remote { index }) = item.assignment() else {
            return false;
        };
        let name = item.name().clone();
        let Some(server) = self.workers.get_mut(&index) else {
            return false;
        };
        match server.abort_assignment(&name) {
            Some(id) => {
                return_items(store, index, vec![id]);
                true
            }
            None => false,
        }
    }

    /// Accept and identify connections, pump every worker once and retire
    /// finished ones. Never blocks.
    pub fn tick(&mut self, store: &mut WorkItemStore, local_idle: bool) {
        self.accept_connections();
        self.match_handshakes();
        self.retire_surplus(store);
        for server in self.workers.values_mut() {
            server.tick(self.launcher.as_ref(), store);
        }
        self.collect_finished(store);
        self.tick_shutting_down(store);
        self.observe_stall(store, local_idle);
    }

    /// Shut every worker down and wait until all of them are gone, then
    /// restore the start-of-process worker count.
    pub async fn shutdown_session(&mut self, store: &mut WorkItemStore) {
        let indices: Vec<u32> = self.workers.keys().copied().collect();
        for index in indices {
            if let Some(server) = self.workers.remove(&index) {
                self.retire(store, server);
            }
        }
        self.pending.clear();

        let started = self.clock.now();
        while !self.shutting_down.is_empty() {
            self.tick_shutting_down(store);
            if self.shutting_down.is_empty() {
                break;
            }
            tokio::time::sleep(self.options.shutdown_poll).await;
        }
        info!(
            elapsed = %format_duration(self.clock.now().saturating_duration_since(started)),
            "all workers shut down"
        );
        self.desired_workers = self.options.worker_count;
        self.stall = StallMonitor::default();
    }

    fn launch_command(&self, index: u32) -> LaunchCommand {
        let mut args = vec![
            "--director".to_string(),
            self.acceptor.local_addr(),
            "--worker-index".to_string(),
            index.to_string(),
            "--visibility".to_string(),
            self.options.visibility.as_str().to_string(),
        ];
        if let Some(dir) = &self.options.log_dir {
            args.push("--log-dir".to_string());
            args.push(dir.display().to_string());
        }
        if self.options.no_timeouts {
            args.push("--no-timeouts".to_string());
        }
        LaunchCommand {
            program: self.options.worker_executable.clone(),
            args,
            visibility: self.options.visibility,
        }
    }

    /// Create proxies until the active pool matches the worker count,
    /// filling gaps left by retired workers first.
    fn ensure_workers(&mut self) {
        while self.active_indices().len() < self.desired_workers as usize {
            let index = self.indices.allocate();
            let server = WorkerServer::new(
                index,
                self.launch_command(index),
                self.options.server.clone(),
                self.clock.clone(),
            );
            debug!(worker = index, "created worker slot");
            self.workers.insert(index, server);
        }
    }

    fn accept_connections(&mut self) {
        loop {
            match self.acceptor.try_accept() {
                Ok(Some(transport)) => {
                    debug!(peer = %transport.peer(), "accepted connection");
                    self.pending.push(PendingConnection {
                        connection: Connection::new(transport),
                        accepted_at: self.clock.now(),
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    break;
                }
            }
        }
    }

    fn match_handshakes(&mut self) {
        let now = self.clock.now();
        for mut pending in std::mem::take(&mut self.pending) {
            let peer = pending.connection.peer();
            match pending.connection.receive() {
                Ok(Some(Message::WorkerConnect(WorkerConnect { remote_index }))) => {
                    self.claim(remote_index, pending.connection);
                }
                Ok(Some(other)) => {
                    warn!(peer = %peer, kind = %other.kind(), "expected handshake, dropping connection");
                }
                Ok(None) => {
                    let waited = now.saturating_duration_since(pending.accepted_at);
                    if self
                        .options
                        .server
                        .connect_timeout
                        .is_some_and(|timeout| waited >= timeout)
                    {
                        warn!(peer = %peer, "no handshake in time, dropping connection");
                    } else {
                        self.pending.push(pending);
                    }
                }
                Err(e) => {
                    warn!(peer = %peer, error = %e, "dropping unidentified connection");
                }
            }
        }
    }

    fn claim(&mut self, index: u32, connection: Connection) {
        let Some(server) = self.workers.get_mut(&index) else {
            warn!(worker = index, peer = %connection.peer(), "handshake for unknown worker slot, dropping connection");
            return;
        };
        if let Err(connection) = server.accept_connection(connection) {
            warn!(
                worker = index,
                peer = %connection.peer(),
                status = %server.status(),
                "worker slot already claimed, dropping connection"
            );
        }
    }

    fn retire_surplus(&mut self, store: &mut WorkItemStore) {
        loop {
            let active = self.active_indices();
            if active.len() <= self.desired_workers as usize {
                return;
            }
            let Some(index) = active.last().copied() else {
                return;
            };
            if let Some(server) = self.workers.remove(&index) {
                info!(worker = index, "retiring surplus worker");
                self.retire(store, server);
            }
        }
    }

    /// Move a proxy out of the active pool: reclaim its items, free its
    /// index and keep ticking it until it has shut down.
    fn retire(&mut self, store: &mut WorkItemStore, mut server: WorkerServer<C>) {
        let index = server.index();
        let ids = server.abort_worker();
        return_items(store, index, ids);
        self.indices.release(index);
        if !server.is_shutdown_complete() {
            self.shutting_down.push(server);
        }
    }

    fn collect_finished(&mut self, store: &mut WorkItemStore) {
        let finished: Vec<u32> = self
            .workers
            .iter()
            .filter(|(_, server)| server.is_shutting_down() || server.is_shutdown_complete())
            .map(|(index, _)| *index)
            .collect();
        for index in finished {
            let Some(mut server) = self.workers.remove(&index) else {
                continue;
            };
            let ids = server.abort_all_assignments();
            return_items(store, index, ids);
            self.indices.release(index);

            if server.is_shutdown_complete() && !server.was_connected() {
                // A slot that never came up stays closed for the session.
                self.desired_workers = self.desired_workers.saturating_sub(1);
                warn!(
                    worker = index,
                    workers = self.desired_workers,
                    "worker failed to start, continuing with fewer workers"
                );
            }
            if server.is_shutting_down() {
                self.shutting_down.push(server);
            }
        }
    }

    fn tick_shutting_down(&mut self, store: &mut WorkItemStore) {
        for server in &mut self.shutting_down {
            server.tick(self.launcher.as_ref(), store);
        }
        self.shutting_down.retain_mut(|server| {
            if !server.is_shutdown_complete() {
                return true;
            }
            let ids = server.abort_all_assignments();
            return_items(store, server.index(), ids);
            debug!(worker = server.index(), "worker shutdown complete");
            false
        });
    }

    fn observe_stall(&mut self, store: &WorkItemStore, local_idle: bool) {
        let remote = store.request_queue().num_assigned();
        let stalled = local_idle && remote > 0;
        if let Some(stalled_for) = self.stall.observe(
            stalled,
            self.clock.now(),
            self.options.stall_warn_after,
            self.options.stall_warn_interval,
        ) {
            warn!(
                idle = %format_duration(stalled_for),
                remote,
                workers = self.workers.len(),
                "local scheduler idle while items remain on remote workers"
            );
        }
    }
}

/// Hand items held by a worker back to the request queue.
fn return_items(store: &mut WorkItemStore, index: u32, ids: Vec<ItemId>) {
    let owner = WorkerId::remote(index);
    let ids: Vec<ItemId> = ids
        .into_iter()
        .filter(|&id| store.is_assigned_to(id, owner))
        .collect();
    if ids.is_empty() {
        return;
    }
    info!(worker = index, count = ids.len(), "returning items to request queue");
    for id in ids {
        if let Err(e) = store.return_to_request(id) {
            warn!(worker = index, item = %id, error = %e, "failed to return item");
        }
    }
}

#[async_trait]
impl<C: Clock> WorkDistributor for Director<C> {
    fn assign_requests(&mut self, items: &[(ItemId, ItemName)]) -> Vec<WorkerId> {
        Director::assign_requests(self, items)
    }

    fn can_build_remotely(&self, targets: &BTreeSet<TargetName>) -> bool {
        let session = &self.options.server.configure.targets;
        targets.iter().all(|target| session.contains(target))
    }

    fn remove_from_worker(&mut self, store: &mut WorkItemStore, id: ItemId) -> bool {
        Director::remove_from_worker(self, store, id)
    }

    fn tick(&mut self, store: &mut WorkItemStore, local_idle: bool) {
        Director::tick(self, store, local_idle)
    }

    async fn shutdown_session(&mut self, store: &mut WorkItemStore) {
        Director::shutdown_session(self, store).await
    }
}

#[cfg(test)]
impl<C: Clock> Director<C> {
    /// Indices of active workers holding `name`, queued or in flight.
    fn holders(&self, name: &ItemName) -> Vec<u32> {
        self.workers
            .iter()
            .filter(|(_, server)| server.holds(name))
            .map(|(index, _)| *index)
            .collect()
    }
}

#[cfg(test)]
#[path = "director_tests.rs"]
mod tests;
