// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Cook engine: local build scheduling and distribution seams

mod distributor;
mod error;
mod executor;
pub mod load_balance;
mod runtime;
mod scheduler;

pub use distributor::{LocalOnly, WorkDistributor};
pub use error::{BuildError, RuntimeError};
pub use executor::{build_item, BuildExecutor, CommandExecutor, ItemReport};
pub use runtime::{CookRequest, Runtime, RuntimeConfig, RuntimeHandle};
pub use scheduler::{decide_next_action, SchedulerAction};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use executor::{ExecutorCall, FakeExecutor};
