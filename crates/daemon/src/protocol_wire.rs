// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format encoding/decoding for the director protocol.
//!
//! Wire format: 4-byte length prefix (big-endian), then a 16-byte kind tag,
//! then the JSON body. The length covers tag and body.

use thiserror::Error;
use uuid::Uuid;

use super::Message;

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Frame too short for a kind tag: {size} bytes")]
    FrameTooShort { size: usize },

    #[error("Unknown message kind: {0}")]
    UnknownKind(Uuid),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum frame payload size (64 MB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

const LEN_PREFIX: usize = 4;
const TAG_LEN: usize = 16;

/// Encode a message as a complete frame, length prefix included.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let body = msg.encode_body()?;
    let len = TAG_LEN + body.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut frame = Vec::with_capacity(LEN_PREFIX + len);
    frame.extend_from_slice(&(len as u32).to_be_bytes());
    frame.extend_from_slice(msg.kind().tag().as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a frame payload (tag + body, no length prefix).
pub fn decode_payload(payload: &[u8]) -> Result<Message, ProtocolError> {
    if payload.len() < TAG_LEN {
        return Err(ProtocolError::FrameTooShort {
            size: payload.len(),
        });
    }
    let (tag, body) = payload.split_at(TAG_LEN);
    let tag = Uuid::from_slice(tag).map_err(|_| ProtocolError::FrameTooShort {
        size: payload.len(),
    })?;
    Message::decode_body(tag, body)
}

/// Remove and decode the first complete frame in `buf`.
///
/// Returns `Ok(None)` when `buf` holds only part of a frame. An oversized
/// length prefix is rejected before its payload arrives.
pub fn take_frame(buf: &mut Vec<u8>) -> Result<Option<Message>, ProtocolError> {
    let Some(prefix) = buf.get(..LEN_PREFIX) else {
        return Ok(None);
    };
    let mut len_bytes = [0u8; LEN_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if buf.len() < LEN_PREFIX + len {
        return Ok(None);
    }

    let frame: Vec<u8> = buf.drain(..LEN_PREFIX + len).collect();
    decode_payload(&frame[LEN_PREFIX..]).map(Some)
}
