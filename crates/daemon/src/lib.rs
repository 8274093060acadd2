// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cook-director: distributes cook requests over a pool of worker processes
//!
//! The director owns one [`WorkerServer`] proxy per remote worker, stripes
//! request batches across them and returns items to the request queue
//! whenever a worker goes away.

pub mod config;
pub mod connection;
pub mod director;
pub mod env;
pub mod listener;
pub mod protocol;
pub mod worker_server;

pub use config::{ConfigError, DirectorConfig, EnvOverrides};
pub use connection::Connection;
pub use director::{Director, DirectorOptions};
pub use listener::TcpAcceptor;
pub use protocol::{Message, MessageKind, ProtocolError};
pub use worker_server::{ConnectStatus, WorkerServer, WorkerServerConfig};
