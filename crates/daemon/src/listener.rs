// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP accept loop feeding the director's non-blocking acceptor.
//!
//! Accepting runs in a spawned task so the director's tick never waits on
//! the socket. Accepted streams are handed over through a channel.

use std::io;
use std::time::Duration;

use cook_adapters::{Acceptor, TcpTransport, Transport};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Back-off after a failed accept, e.g. when out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

pub struct TcpAcceptor {
    local_addr: String,
    incoming: mpsc::UnboundedReceiver<TcpTransport>,
    task: JoinHandle<()>,
}

impl TcpAcceptor {
    /// Bind `host:port`. Port 0 picks an ephemeral port; see [`Acceptor::local_addr`].
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let local_addr = listener.local_addr()?.to_string();
        let (tx, incoming) = mpsc::unbounded_channel();
        let task = tokio::spawn(accept_loop(listener, tx));
        debug!(addr = %local_addr, "listening for workers");
        Ok(Self {
            local_addr,
            incoming,
            task,
        })
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::UnboundedSender<TcpTransport>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "incoming connection");
                if tx.send(TcpTransport::new(stream)).is_err() {
                    // Acceptor dropped.
                    return;
                }
            }
            Err(e) => {
                error!("Accept error: {}", e);
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

impl Acceptor for TcpAcceptor {
    fn try_accept(&mut self) -> io::Result<Option<Box<dyn Transport>>> {
        match self.incoming.try_recv() {
            Ok(transport) => Ok(Some(Box::new(transport))),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(io::Error::other("accept loop stopped"))
            }
        }
    }

    fn local_addr(&self) -> String {
        self.local_addr.clone()
    }
}

impl Drop for TcpAcceptor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
