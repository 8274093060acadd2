// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory transports for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Acceptor, Transport};

#[derive(Debug, Default)]
struct Pipe {
    data: VecDeque<u8>,
    closed: bool,
}

/// One end of an in-memory duplex stream.
///
/// Dropping or closing either end makes the peer read EOF and fail writes.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: Arc<Mutex<Pipe>>,
    outbound: Arc<Mutex<Pipe>>,
    peer: String,
}

impl MemoryTransport {
    /// Create a connected pair. `a` and `b` name each side's peer in logs.
    pub fn pair(a: &str, b: &str) -> (MemoryTransport, MemoryTransport) {
        let a_to_b = Arc::new(Mutex::new(Pipe::default()));
        let b_to_a = Arc::new(Mutex::new(Pipe::default()));
        let first = MemoryTransport {
            inbound: Arc::clone(&b_to_a),
            outbound: Arc::clone(&a_to_b),
            peer: b.to_string(),
        };
        let second = MemoryTransport {
            inbound: a_to_b,
            outbound: b_to_a,
            peer: a.to_string(),
        };
        (first, second)
    }

    pub fn close(&self) {
        self.inbound.lock().closed = true;
        self.outbound.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inbound.lock().closed
    }

    /// Bytes written by the peer and not yet read.
    pub fn pending(&self) -> usize {
        self.inbound.lock().data.len()
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl Transport for MemoryTransport {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.inbound.lock();
        if pipe.data.is_empty() {
            if pipe.closed {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        }
        let n = buf.len().min(pipe.data.len());
        for (slot, byte) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut pipe = self.outbound.lock();
        if pipe.closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        pipe.data.extend(buf);
        Ok(buf.len())
    }

    fn peer(&self) -> String {
        self.peer.clone()
    }
}

/// Acceptor fed by a [`MemoryConnector`].
#[derive(Debug)]
pub struct MemoryAcceptor {
    queue: Arc<Mutex<VecDeque<MemoryTransport>>>,
    counter: Arc<Mutex<u32>>,
}

/// Client-side handle that "dials" a [`MemoryAcceptor`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    queue: Arc<Mutex<VecDeque<MemoryTransport>>>,
    counter: Arc<Mutex<u32>>,
}

impl MemoryAcceptor {
    pub fn new() -> (MemoryAcceptor, MemoryConnector) {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let counter = Arc::new(Mutex::new(0));
        (
            MemoryAcceptor {
                queue: Arc::clone(&queue),
                counter: Arc::clone(&counter),
            },
            MemoryConnector { queue, counter },
        )
    }
}

impl MemoryConnector {
    /// Open a new connection, returning the client end.
    pub fn connect(&self) -> MemoryTransport {
        let n = {
            let mut counter = self.counter.lock();
            *counter += 1;
            *counter
        };
        let (client, server) = MemoryTransport::pair("director", &format!("memory-client-{n}"));
        self.queue.lock().push_back(server);
        client
    }

    /// Connections not yet picked up by the acceptor.
    pub fn backlog(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Acceptor for MemoryAcceptor {
    fn try_accept(&mut self) -> io::Result<Option<Box<dyn Transport>>> {
        Ok(self
            .queue
            .lock()
            .pop_front()
            .map(|t| Box::new(t) as Box<dyn Transport>))
    }

    fn local_addr(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
