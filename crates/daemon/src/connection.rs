// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Buffered, non-blocking message connection over a [`Transport`].

use cook_adapters::{is_transient, Transport};

use crate::protocol::{encode, take_frame, Message, ProtocolError};

const READ_CHUNK: usize = 16 * 1024;

/// One framed connection. Sends queue into an outgoing buffer that is
/// flushed as far as the transport allows; receives decode whatever
/// complete frames have arrived.
pub struct Connection {
    transport: Box<dyn Transport>,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    eof: bool,
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            read_buf: Vec::new(),
            write_buf: Vec::new(),
            eof: false,
        }
    }

    pub fn peer(&self) -> String {
        self.transport.peer()
    }

    /// Queue a message and flush as much as possible.
    pub fn send(&mut self, msg: &Message) -> Result<(), ProtocolError> {
        let frame = encode(msg)?;
        self.write_buf.extend_from_slice(&frame);
        self.flush()
    }

    /// Write buffered bytes until the transport would block.
    pub fn flush(&mut self) -> Result<(), ProtocolError> {
        while !self.write_buf.is_empty() {
            match self.transport.try_write(&self.write_buf) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed),
                Ok(n) => {
                    self.write_buf.drain(..n);
                }
                Err(e) if is_transient(&e) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.write_buf.is_empty()
    }

    /// Next complete message, if one has arrived.
    ///
    /// Fails with [`ProtocolError::ConnectionClosed`] once the peer has
    /// closed and every buffered frame has been consumed.
    pub fn receive(&mut self) -> Result<Option<Message>, ProtocolError> {
        if let Some(msg) = take_frame(&mut self.read_buf)? {
            return Ok(Some(msg));
        }
        if !self.eof {
            self.fill()?;
        }
        match take_frame(&mut self.read_buf)? {
            Some(msg) => Ok(Some(msg)),
            None if self.eof => Err(ProtocolError::ConnectionClosed),
            None => Ok(None),
        }
    }

    fn fill(&mut self) -> Result<(), ProtocolError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.transport.try_read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_transient(&e) => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer())
            .field("buffered_in", &self.read_buf.len())
            .field("buffered_out", &self.write_buf.len())
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
