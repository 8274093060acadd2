// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Director-side proxy for one remote worker.
//!
//! Owns the worker's OS process and connection, the items queued for it
//! and the items it is building. Every item it holds is either surfaced
//! through one of the abort paths or resolved by a `Results` message.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use cook_adapters::{LaunchCommand, ProcessLauncher, WorkerProcess};
use cook_core::{Clock, CookOutcome, ItemId, ItemName, WorkerId};
use cook_storage::{RemoteResolution, StoreError, WorkItemStore};
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::protocol::{Configure, ItemResult, Message, ProtocolError};

/// Connection state of a worker proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// Process not launched yet.
    Uninitialized,
    /// Process launched, handshake not received.
    WaitForConnect,
    /// Steady state; assignments and results flow.
    Connected,
    /// `AbortWorker` sent, waiting for acknowledgment or process exit.
    WaitForDisconnect,
    /// Terminal.
    LostConnection,
}

impl ConnectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectStatus::Uninitialized => "uninitialized",
            ConnectStatus::WaitForConnect => "wait_for_connect",
            ConnectStatus::Connected => "connected",
            ConnectStatus::WaitForDisconnect => "wait_for_disconnect",
            ConnectStatus::LostConnection => "lost_connection",
        }
    }
}

impl std::fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings shared by every worker proxy of a director.
#[derive(Debug, Clone)]
pub struct WorkerServerConfig {
    /// `None` waits forever.
    pub connect_timeout: Option<Duration>,
    /// `None` waits forever.
    pub disconnect_timeout: Option<Duration>,
    pub liveness_interval: Duration,
    /// Sent to the worker as soon as its handshake is accepted.
    pub configure: Configure,
}

impl Default for WorkerServerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(60)),
            disconnect_timeout: Some(Duration::from_secs(30)),
            liveness_interval: Duration::from_secs(1),
            configure: Configure::default(),
        }
    }
}

pub struct WorkerServer<C: Clock> {
    index: u32,
    status: ConnectStatus,
    status_since: Instant,
    last_probe: Instant,
    launch: LaunchCommand,
    process: Option<Box<dyn WorkerProcess>>,
    connection: Option<Connection>,
    connected_once: bool,
    /// Queued, not yet sent.
    pending: Vec<(ItemId, ItemName)>,
    /// Sent, awaiting results.
    assigned: BTreeMap<ItemName, ItemId>,
    config: WorkerServerConfig,
    clock: C,
}

impl<C: Clock> WorkerServer<C> {
    pub fn new(index: u32, launch: LaunchCommand, config: WorkerServerConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            index,
            status: ConnectStatus::Uninitialized,
            status_since: now,
            last_probe: now,
            launch,
            process: None,
            connection: None,
            connected_once: false,
            pending: Vec::new(),
            assigned: BTreeMap::new(),
            config,
            clock,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn status(&self) -> ConnectStatus {
        self.status
    }

    /// Whether a handshake was ever accepted. A worker lost before that
    /// failed to launch or to connect.
    pub fn was_connected(&self) -> bool {
        self.connected_once
    }

    /// Whether new work may be staged on this worker.
    pub fn is_accepting_work(&self) -> bool {
        matches!(
            self.status,
            ConnectStatus::Uninitialized | ConnectStatus::WaitForConnect | ConnectStatus::Connected
        )
    }

    pub fn is_shutting_down(&self) -> bool {
        self.status == ConnectStatus::WaitForDisconnect
    }

    pub fn is_shutdown_complete(&self) -> bool {
        self.status == ConnectStatus::LostConnection
    }

    /// Items queued or sent and not yet resolved.
    pub fn num_outstanding(&self) -> usize {
        self.pending.len() + self.assigned.len()
    }

    pub fn holds(&self, name: &ItemName) -> bool {
        self.assigned.contains_key(name) || self.pending.iter().any(|(_, n)| n == name)
    }

    /// Queue items for transmission on the next tick.
    ///
    /// Callers must not stage an item that this worker already holds.
    pub fn append_assignments(&mut self, items: impl IntoIterator<Item = (ItemId, ItemName)>) {
        self.pending.extend(items);
    }

    /// Stop building one item. Returns its id if this worker held it.
    pub fn abort_assignment(&mut self, name: &ItemName) -> Option<ItemId> {
        if let Some(pos) = self.pending.iter().position(|(_, n)| n == name) {
            let (id, _) = self.pending.remove(pos);
            return Some(id);
        }
        let id = self.assigned.remove(name)?;
        self.send_if_connected(Message::abort_items(vec![name.clone()]));
        Some(id)
    }

    /// Stop building everything. Returns every item that must be reassigned.
    pub fn abort_all_assignments(&mut self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.pending.drain(..).map(|(id, _)| id).collect();
        let assigned = std::mem::take(&mut self.assigned);
        if !assigned.is_empty() {
            let names: Vec<ItemName> = assigned.keys().cloned().collect();
            self.send_if_connected(Message::abort_items(names));
        }
        ids.extend(assigned.into_values());
        ids
    }

    /// Ask the worker to shut down gracefully. Returns every item that must
    /// be reassigned.
    pub fn abort_worker(&mut self) -> Vec<ItemId> {
        let ids = self.abort_all_assignments();
        match self.status {
            ConnectStatus::Connected => {
                if let Err(e) = self.send(&Message::abort_worker()) {
                    self.lose_connection(&format!("failed to send abort: {e}"));
                } else {
                    info!(worker = self.index, "asked worker to shut down");
                    self.set_status(ConnectStatus::WaitForDisconnect);
                }
            }
            ConnectStatus::Uninitialized | ConnectStatus::WaitForConnect => {
                self.kill_process();
                self.set_status(ConnectStatus::LostConnection);
            }
            ConnectStatus::WaitForDisconnect | ConnectStatus::LostConnection => {}
        }
        ids
    }

    /// Hand over a connection whose `WorkerConnect` handshake named this
    /// worker. Gives the connection back if the worker is not expecting one.
    pub fn accept_connection(&mut self, connection: Connection) -> Result<(), Connection> {
        if self.status != ConnectStatus::WaitForConnect {
            return Err(connection);
        }
        info!(worker = self.index, peer = %connection.peer(), "worker connected");
        self.connection = Some(connection);
        self.connected_once = true;
        self.set_status(ConnectStatus::Connected);
        let configure = Message::Configure(self.config.configure.clone());
        if let Err(e) = self.send(&configure) {
            self.lose_connection(&format!("failed to send configuration: {e}"));
        }
        Ok(())
    }

    /// Drive the state machine one step. Never blocks.
    pub fn tick(&mut self, launcher: &dyn ProcessLauncher, store: &mut WorkItemStore) {
        self.release_stale(store);
        match self.status {
            ConnectStatus::Uninitialized => self.launch(launcher),
            ConnectStatus::WaitForConnect => self.poll_connect(),
            ConnectStatus::Connected => self.pump(store),
            ConnectStatus::WaitForDisconnect => self.poll_disconnect(),
            ConnectStatus::LostConnection => {}
        }
    }

    /// Drop items the store no longer assigns to this worker, such as items
    /// cancelled while queued or in flight here.
    fn release_stale(&mut self, store: &WorkItemStore) {
        let owner = WorkerId::remote(self.index);
        let before = self.pending.len();
        self.pending.retain(|(id, _)| store.is_assigned_to(*id, owner));
        let unsent = before - self.pending.len();

        let stale: Vec<ItemName> = self
            .assigned
            .iter()
            .filter(|(_, id)| !store.is_assigned_to(**id, owner))
            .map(|(name, _)| name.clone())
            .collect();
        if unsent == 0 && stale.is_empty() {
            return;
        }
        debug!(worker = self.index, unsent, sent = stale.len(), "releasing items no longer assigned here");
        if stale.is_empty() {
            return;
        }
        for name in &stale {
            self.assigned.remove(name);
        }
        self.send_if_connected(Message::abort_items(stale));
    }

    fn launch(&mut self, launcher: &dyn ProcessLauncher) {
        match launcher.launch(&self.launch) {
            Ok(process) => {
                info!(
                    worker = self.index,
                    pid = ?process.pid(),
                    command = %self.launch.display_line(),
                    "launched worker"
                );
                self.process = Some(process);
                self.last_probe = self.clock.now();
                self.set_status(ConnectStatus::WaitForConnect);
            }
            Err(e) => {
                error!(worker = self.index, error = %e, "failed to launch worker");
                self.set_status(ConnectStatus::LostConnection);
            }
        }
    }

    fn poll_connect(&mut self) {
        if !self.probe_process() {
            warn!(worker = self.index, "worker process exited before connecting");
            self.set_status(ConnectStatus::LostConnection);
            return;
        }
        if self.timed_out(self.config.connect_timeout) {
            warn!(
                worker = self.index,
                waited = %cook_core::format_duration(self.in_status()),
                "worker did not connect in time, killing it"
            );
            self.kill_process();
            self.set_status(ConnectStatus::LostConnection);
        }
    }

    fn pump(&mut self, store: &mut WorkItemStore) {
        if !self.pending.is_empty() {
            let batch: Vec<(ItemId, ItemName)> = self.pending.drain(..).collect();
            let names = batch.iter().map(|(_, name)| name.clone()).collect();
            debug!(worker = self.index, count = batch.len(), "sending assignments");
            self.assigned.extend(batch.into_iter().map(|(id, name)| (name, id)));
            if let Err(e) = self.send(&Message::assign(names)) {
                self.lose_connection(&format!("failed to send assignments: {e}"));
                return;
            }
        }
        if let Err(e) = self.flush() {
            self.lose_connection(&format!("send failed: {e}"));
            return;
        }

        loop {
            match self.receive() {
                Ok(Some(Message::Results(results))) => {
                    for result in results.items {
                        self.handle_result(store, result);
                    }
                }
                Ok(Some(Message::AbortWorker(_))) => {
                    self.lose_connection("worker shut down unexpectedly");
                    return;
                }
                Ok(Some(other)) => {
                    self.lose_connection(&format!("unexpected {} message", other.kind()));
                    return;
                }
                Ok(None) => break,
                Err(e) => {
                    self.lose_connection(&e.to_string());
                    return;
                }
            }
        }

        if !self.probe_process() {
            self.lose_connection("worker process exited");
        }
    }

    fn handle_result(&mut self, store: &mut WorkItemStore, result: ItemResult) {
        let Some(id) = self.assigned.remove(&result.name) else {
            debug!(worker = self.index, item = %result.name, "ignoring result for item no longer assigned");
            return;
        };
        for build in &result.per_target {
            for message in &build.side_messages {
                info!(worker = self.index, item = %result.name, target = %build.target, "{}", message);
            }
        }
        let owner = WorkerId::remote(self.index);
        let outcome = match result.suppress_reason {
            Some(reason) => store
                .complete_remote(id, owner, CookOutcome::Skipped { reason })
                .map(|()| RemoteResolution::Completed),
            None => store.record_remote_results(id, owner, result.per_target),
        };
        match outcome {
            Ok(resolution) => {
                debug!(worker = self.index, item = %result.name, ?resolution, "remote result")
            }
            Err(StoreError::NotAssignedTo { .. }) => {
                debug!(worker = self.index, item = %result.name, "ignoring result for item owned elsewhere")
            }
            Err(e) => warn!(worker = self.index, item = %result.name, error = %e, "failed to record remote result"),
        }
    }

    fn poll_disconnect(&mut self) {
        if let Err(e) = self.flush() {
            debug!(worker = self.index, error = %e, "send failed while disconnecting");
            self.finish_disconnect();
            return;
        }
        loop {
            match self.receive() {
                Ok(Some(Message::AbortWorker(_))) => {
                    info!(worker = self.index, "worker acknowledged shutdown");
                    self.finish_disconnect();
                    return;
                }
                // Results for items already handed back are stale.
                Ok(Some(msg)) => {
                    debug!(worker = self.index, kind = %msg.kind(), "ignoring message while disconnecting")
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(worker = self.index, error = %e, "connection ended while disconnecting");
                    self.finish_disconnect();
                    return;
                }
            }
        }
        if !self.probe_process() {
            info!(worker = self.index, "worker process exited");
            self.finish_disconnect();
            return;
        }
        if self.timed_out(self.config.disconnect_timeout) {
            warn!(worker = self.index, "worker did not shut down in time, killing it");
            self.kill_process();
            self.finish_disconnect();
        }
    }

    fn finish_disconnect(&mut self) {
        self.connection = None;
        self.set_status(ConnectStatus::LostConnection);
    }

    fn lose_connection(&mut self, reason: &str) {
        let peer = self.connection.as_ref().map(Connection::peer);
        warn!(
            worker = self.index,
            peer = peer.as_deref().unwrap_or("none"),
            outstanding = self.num_outstanding(),
            reason,
            "lost connection to worker"
        );
        self.connection = None;
        self.kill_process();
        self.set_status(ConnectStatus::LostConnection);
    }

    fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        match self.connection.as_mut() {
            Some(connection) => connection.send(msg),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    fn send_if_connected(&mut self, msg: Message) {
        if self.status != ConnectStatus::Connected {
            return;
        }
        if let Err(e) = self.send(&msg) {
            self.lose_connection(&format!("failed to send {}: {e}", msg.kind()));
        }
    }

    fn flush(&mut self) -> Result<(), ProtocolError> {
        match self.connection.as_mut() {
            Some(connection) => connection.flush(),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    fn receive(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self.connection.as_mut() {
            Some(connection) => connection.receive(),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Liveness probe, rate limited to the configured interval. Reports
    /// alive between probes.
    fn probe_process(&mut self) -> bool {
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_probe) < self.config.liveness_interval {
            return true;
        }
        self.last_probe = now;
        self.process.as_mut().is_some_and(|p| p.is_running())
    }

    fn kill_process(&mut self) {
        if let Some(process) = self.process.as_mut() {
            if process.is_running() {
                debug!(worker = self.index, pid = ?process.pid(), "killing worker process");
                process.kill();
            }
        }
    }

    fn set_status(&mut self, status: ConnectStatus) {
        if self.status != status {
            debug!(worker = self.index, from = %self.status, to = %status, "worker status");
            self.status = status;
            self.status_since = self.clock.now();
        }
    }

    fn in_status(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.status_since)
    }

    fn timed_out(&self, timeout: Option<Duration>) -> bool {
        timeout.is_some_and(|t| self.in_status() >= t)
    }
}

#[cfg(test)]
#[path = "worker_server_tests.rs"]
mod tests;
