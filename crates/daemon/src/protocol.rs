// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Director <-> worker message catalogue.
//!
//! Every message travels as `{kind tag, JSON body}`; the tag is a fixed
//! UUID per message kind and selects the body decoder.

use cook_core::{ItemName, TargetBuild, TargetName};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[path = "protocol_wire.rs"]
mod wire;

pub use wire::{decode_payload, encode, take_frame, ProtocolError, MAX_MESSAGE_SIZE};

/// Worker -> director handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConnect {
    pub remote_index: u32,
}

/// Director -> worker session configuration, sent right after the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configure {
    pub targets: Vec<TargetName>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub build_timeout_secs: Option<u64>,
    #[serde(default)]
    pub no_timeouts: bool,
}

/// Director -> worker: build these items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignItems {
    pub names: Vec<ItemName>,
}

/// Director -> worker: forget these items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortItems {
    pub names: Vec<ItemName>,
}

/// Either direction: shut the worker down (or announce that it is going).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AbortWorker {}

/// Outcome of one assigned item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub name: ItemName,
    #[serde(default)]
    pub suppress_reason: Option<String>,
    #[serde(default)]
    pub per_target: Vec<TargetBuild>,
}

/// Worker -> director: finished items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    pub items: Vec<ItemResult>,
}

/// The closed set of messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    WorkerConnect(WorkerConnect),
    Configure(Configure),
    AssignItems(AssignItems),
    AbortItems(AbortItems),
    AbortWorker(AbortWorker),
    Results(Results),
}

type Decoder = fn(&[u8]) -> Result<Message, serde_json::Error>;

/// Message kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    WorkerConnect,
    Configure,
    AssignItems,
    AbortItems,
    AbortWorker,
    Results,
}

/// Tag and body decoder per kind.
const DISPATCH: [(MessageKind, u128, Decoder); 6] = [
    (
        MessageKind::WorkerConnect,
        0x6a1f3c52_8e0b_4d7a_9c41_2b7e5d90f1a3,
        |body| serde_json::from_slice(body).map(Message::WorkerConnect),
    ),
    (
        MessageKind::Configure,
        0x0d94b7e1_52c6_4f08_8a3d_c1e67f2049b8,
        |body| serde_json::from_slice(body).map(Message::Configure),
    ),
    (
        MessageKind::AssignItems,
        0x3be0a9d4_7f12_4c85_b06e_94d1c38a5e27,
        |body| serde_json::from_slice(body).map(Message::AssignItems),
    ),
    (
        MessageKind::AbortItems,
        0xc7258e6f_13a4_4b9d_8e70_5fa2d41b0c96,
        |body| serde_json::from_slice(body).map(Message::AbortItems),
    ),
    (
        MessageKind::AbortWorker,
        0x91d4f0b3_6c28_47e5_a9f1_3e8b07c2d54a,
        |body| serde_json::from_slice(body).map(Message::AbortWorker),
    ),
    (
        MessageKind::Results,
        0x2e8c5a17_d94f_4063_b2a8_f61c0e7d3b95,
        |body| serde_json::from_slice(body).map(Message::Results),
    ),
];

impl MessageKind {
    pub const ALL: [MessageKind; 6] = [
        MessageKind::WorkerConnect,
        MessageKind::Configure,
        MessageKind::AssignItems,
        MessageKind::AbortItems,
        MessageKind::AbortWorker,
        MessageKind::Results,
    ];

    pub fn tag(self) -> Uuid {
        DISPATCH
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map_or(Uuid::nil(), |(_, tag, _)| Uuid::from_u128(*tag))
    }

    pub fn from_tag(tag: Uuid) -> Option<MessageKind> {
        let raw = tag.as_u128();
        DISPATCH
            .iter()
            .find(|(_, t, _)| *t == raw)
            .map(|(kind, _, _)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageKind::WorkerConnect => "WorkerConnect",
            MessageKind::Configure => "Configure",
            MessageKind::AssignItems => "AssignItems",
            MessageKind::AbortItems => "AbortItems",
            MessageKind::AbortWorker => "AbortWorker",
            MessageKind::Results => "Results",
        }
    }

    fn decoder(self) -> Option<Decoder> {
        DISPATCH
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, _, decoder)| *decoder)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::WorkerConnect(_) => MessageKind::WorkerConnect,
            Message::Configure(_) => MessageKind::Configure,
            Message::AssignItems(_) => MessageKind::AssignItems,
            Message::AbortItems(_) => MessageKind::AbortItems,
            Message::AbortWorker(_) => MessageKind::AbortWorker,
            Message::Results(_) => MessageKind::Results,
        }
    }

    /// Serialize the body (without tag or length prefix).
    pub fn encode_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Message::WorkerConnect(m) => serde_json::to_vec(m),
            Message::Configure(m) => serde_json::to_vec(m),
            Message::AssignItems(m) => serde_json::to_vec(m),
            Message::AbortItems(m) => serde_json::to_vec(m),
            Message::AbortWorker(m) => serde_json::to_vec(m),
            Message::Results(m) => serde_json::to_vec(m),
        }
    }

    /// Decode a body for a known tag.
    pub fn decode_body(tag: Uuid, body: &[u8]) -> Result<Message, ProtocolError> {
        let decoder = MessageKind::from_tag(tag)
            .and_then(MessageKind::decoder)
            .ok_or(ProtocolError::UnknownKind(tag))?;
        Ok(decoder(body)?)
    }

    pub fn assign(names: Vec<ItemName>) -> Message {
        Message::AssignItems(AssignItems { names })
    }

    pub fn abort_items(names: Vec<ItemName>) -> Message {
        Message::AbortItems(AbortItems { names })
    }

    pub fn abort_worker() -> Message {
        Message::AbortWorker(AbortWorker {})
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
