// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cook-core: shared vocabulary for the multi-process cook director

pub mod clock;
pub mod id;
pub mod item;
pub mod time_fmt;
pub mod visibility;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use id::{ItemId, ItemName, ShortId, TargetName};
pub use item::{
    CompletionCallback, CookOutcome, ItemCompletion, ItemState, TargetBuild, TargetResult,
};
pub use time_fmt::{format_duration, format_elapsed};
pub use visibility::WorkerVisibility;
pub use worker::{WorkerId, WorkerIndexPool};
