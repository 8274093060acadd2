// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Non-blocking byte streams between the director and its workers.
//!
//! Both ends are driven from a polling tick loop, so every operation
//! returns immediately. `WouldBlock` means "nothing to do right now";
//! `Ok(0)` from a read means the peer closed the stream.

mod tcp;

pub use tcp::TcpTransport;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryAcceptor, MemoryConnector, MemoryTransport};

use std::io;

/// A connected, non-blocking byte stream.
pub trait Transport: Send {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Human readable peer description for logs.
    fn peer(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).try_read(buf)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).try_write(buf)
    }

    fn peer(&self) -> String {
        (**self).peer()
    }
}

/// Source of newly accepted, not yet identified connections.
pub trait Acceptor: Send {
    /// Take one accepted connection if any is waiting.
    fn try_accept(&mut self) -> io::Result<Option<Box<dyn Transport>>>;

    /// Address workers should connect to, as `host:port`.
    fn local_addr(&self) -> String;
}

/// Whether an I/O error only means "try again later".
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
