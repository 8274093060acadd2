// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cook-storage: the authoritative in-memory work item store

mod monitor;
mod path;
mod queue;
mod store;

pub use monitor::Monitor;
pub use path::normalize_file_path;
pub use queue::{ItemQueue, RequestQueue};
pub use store::{LoadedPayload, RemoteResolution, StoreError, WorkItem, WorkItemStore};
