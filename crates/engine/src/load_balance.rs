// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Splitting a batch of requests between local and remote workers.
//!
//! Striped round robin is the only policy. It ignores dependencies between
//! items and how fast each worker is; callers may rely only on every item
//! getting exactly one deterministic assignment and on the buckets being
//! balanced to within one item.

use cook_core::WorkerId;

/// Striped round robin over `[Local, Remote(r0), Remote(r1), ...]`.
///
/// Item `i` goes to bucket `i mod (remotes + 1)`.
pub fn striped(count: usize, remote_indices: &[u32]) -> Vec<WorkerId> {
    let buckets = remote_indices.len() + 1;
    (0..count)
        .map(|i| match i % buckets {
            0 => WorkerId::Local,
            n => remote_indices
                .get(n - 1)
                .map_or(WorkerId::Local, |&index| WorkerId::remote(index)),
        })
        .collect()
}

#[cfg(test)]
#[path = "load_balance_tests.rs"]
mod tests;
