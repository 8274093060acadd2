// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-side connection to the director.
//!
//! The handshake waits (with backoff) for the director's `Configure`.
//! After that the worker receives assignments, builds them one at a time
//! and reports each result as soon as it is done.

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use cook_adapters::{TcpTransport, Transport};
use cook_core::{ItemName, TargetName};
use cook_director::protocol::{Configure, ItemResult, Message, ProtocolError, Results, WorkerConnect};
use cook_director::Connection;
use cook_engine::{build_item, BuildExecutor};
use thiserror::Error;
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(20);
const MAX_BACKOFF: Duration = Duration::from_secs(1);
/// Sleep between polls while no work is queued.
const IDLE_POLL: Duration = Duration::from_millis(10);
/// Attempts to flush the shutdown acknowledgment before giving up on it.
const ACK_FLUSH_ATTEMPTS: usize = 100;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to director at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no configuration from director at {addr} after {after:?}")]
    ConnectTimeout { addr: String, after: Duration },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unexpected {kind} message from director")]
    UnexpectedMessage { kind: String },
}

/// Why [`WorkerClient::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The director sent `AbortWorker`.
    DirectorRequested,
    /// The director closed the connection.
    DirectorClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub built: usize,
    pub reason: StopReason,
}

enum Control {
    Continue,
    Stop(StopReason),
}

pub struct WorkerClient {
    connection: Connection,
    index: u32,
    configure: Configure,
}

impl WorkerClient {
    /// Connect to `addr`, retrying until `timeout` elapses (`None` retries
    /// forever), then perform the handshake.
    pub async fn connect(
        addr: &str,
        index: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        let transport = loop {
            match TcpTransport::connect(addr).await {
                Ok(transport) => break transport,
                Err(source) => {
                    if timeout.is_some_and(|t| started.elapsed() >= t) {
                        return Err(ClientError::Connect {
                            addr: addr.to_string(),
                            source,
                        });
                    }
                    debug!(addr, error = %source, "director not reachable yet");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        };
        let remaining = timeout.map(|t| t.saturating_sub(started.elapsed()));
        Self::handshake(Box::new(transport), index, remaining).await
    }

    /// Identify as worker `index` on an open transport and wait for the
    /// director's configuration.
    pub async fn handshake(
        transport: Box<dyn Transport>,
        index: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut connection = Connection::new(transport);
        let addr = connection.peer();
        connection.send(&Message::WorkerConnect(WorkerConnect {
            remote_index: index,
        }))?;

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            connection.flush()?;
            match connection.receive()? {
                Some(Message::Configure(configure)) => {
                    info!(
                        worker = index,
                        director = %addr,
                        targets = configure.targets.len(),
                        "connected to director"
                    );
                    return Ok(Self {
                        connection,
                        index,
                        configure,
                    });
                }
                Some(other) => {
                    return Err(ClientError::UnexpectedMessage {
                        kind: other.kind().to_string(),
                    })
                }
                None => {}
            }
            if let Some(t) = timeout {
                if started.elapsed() >= t {
                    return Err(ClientError::ConnectTimeout { addr, after: t });
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn configure(&self) -> &Configure {
        &self.configure
    }

    /// Tell the director this worker is going away on its own.
    pub fn notify_shutdown(&mut self) -> Result<(), ClientError> {
        self.connection.send(&Message::abort_worker())?;
        Ok(())
    }

    /// Build assigned items until the director stops this worker.
    pub async fn run<E: BuildExecutor + ?Sized>(
        &mut self,
        executor: &E,
    ) -> Result<RunSummary, ClientError> {
        let targets: BTreeSet<TargetName> = self.configure.targets.iter().cloned().collect();
        let mut queue = VecDeque::new();
        let mut aborted = BTreeSet::new();
        let mut built = 0;

        loop {
            if let Control::Stop(reason) = self.drain(&mut queue, &mut aborted).await? {
                return Ok(RunSummary { built, reason });
            }

            let Some(name) = queue.pop_front() else {
                self.connection.flush()?;
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            };

            aborted.clear();
            debug!(worker = self.index, item = %name, "building");
            let report = build_item(executor, &name, &targets).await;
            built += 1;

            if let Control::Stop(reason) = self.drain(&mut queue, &mut aborted).await? {
                return Ok(RunSummary { built, reason });
            }
            if aborted.contains(&name) {
                debug!(worker = self.index, item = %name, "discarding result for aborted item");
                continue;
            }

            let result = ItemResult {
                name: report.name,
                suppress_reason: report.suppress_reason,
                per_target: report.builds,
            };
            self.connection.send(&Message::Results(Results {
                items: vec![result],
            }))?;
        }
    }

    /// Handle every message already received.
    async fn drain(
        &mut self,
        queue: &mut VecDeque<ItemName>,
        aborted: &mut BTreeSet<ItemName>,
    ) -> Result<Control, ClientError> {
        loop {
            let msg = match self.connection.receive() {
                Ok(Some(msg)) => msg,
                Ok(None) => return Ok(Control::Continue),
                Err(ProtocolError::ConnectionClosed) => {
                    info!(worker = self.index, "director closed the connection");
                    return Ok(Control::Stop(StopReason::DirectorClosed));
                }
                Err(e) => return Err(e.into()),
            };
            match msg {
                Message::AssignItems(assign) => {
                    debug!(worker = self.index, count = assign.names.len(), "assigned");
                    for name in assign.names {
                        if !queue.contains(&name) {
                            queue.push_back(name);
                        }
                    }
                }
                Message::AbortItems(abort) => {
                    queue.retain(|name| !abort.names.contains(name));
                    aborted.extend(abort.names);
                }
                Message::AbortWorker(_) => {
                    info!(worker = self.index, "director requested shutdown");
                    self.acknowledge_shutdown().await;
                    return Ok(Control::Stop(StopReason::DirectorRequested));
                }
                other => {
                    return Err(ClientError::UnexpectedMessage {
                        kind: other.kind().to_string(),
                    })
                }
            }
        }
    }

    async fn acknowledge_shutdown(&mut self) {
        if let Err(e) = self.connection.send(&Message::abort_worker()) {
            warn!(worker = self.index, error = %e, "failed to acknowledge shutdown");
            return;
        }
        for _ in 0..ACK_FLUSH_ATTEMPTS {
            if !self.connection.has_pending_writes() {
                return;
            }
            if self.connection.flush().is_err() {
                return;
            }
            tokio::time::sleep(IDLE_POLL).await;
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
