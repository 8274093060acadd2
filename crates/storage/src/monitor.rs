// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Running counters over the work item store.

use cook_core::{ItemState, TargetResult};

/// Counters kept in lockstep with every state change and recorded result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Monitor {
    in_progress: usize,
    urgent: [usize; 5],
    succeeded: usize,
    failed: usize,
}

fn slot(state: ItemState) -> usize {
    match state {
        ItemState::Idle => 0,
        ItemState::Request => 1,
        ItemState::LoadPrepare => 2,
        ItemState::LoadReady => 3,
        ItemState::Save => 4,
    }
}

impl Monitor {
    pub fn num_in_progress(&self) -> usize {
        self.in_progress
    }

    /// Urgent items across every in-progress state.
    pub fn num_urgent(&self) -> usize {
        self.urgent.iter().sum()
    }

    pub fn num_urgent_in(&self, state: ItemState) -> usize {
        self.urgent[slot(state)]
    }

    /// Target results recorded as succeeded.
    pub fn num_succeeded(&self) -> usize {
        self.succeeded
    }

    /// Target results recorded as failed.
    pub fn num_failed(&self) -> usize {
        self.failed
    }

    /// All recorded target results.
    pub fn num_cooked(&self) -> usize {
        self.succeeded + self.failed
    }

    pub(crate) fn on_enter(&mut self, state: ItemState, urgent: bool) {
        if state.is_in_progress() {
            self.in_progress += 1;
            if urgent {
                self.urgent[slot(state)] += 1;
            }
        }
    }

    pub(crate) fn on_exit(&mut self, state: ItemState, urgent: bool) {
        if state.is_in_progress() {
            self.in_progress = self.in_progress.saturating_sub(1);
            if urgent {
                let count = &mut self.urgent[slot(state)];
                *count = count.saturating_sub(1);
            }
        }
    }

    /// An in-progress item became urgent without changing state.
    pub(crate) fn on_promoted(&mut self, state: ItemState) {
        if state.is_in_progress() {
            self.urgent[slot(state)] += 1;
        }
    }

    pub(crate) fn on_result_added(&mut self, result: TargetResult) {
        match result {
            TargetResult::Succeeded => self.succeeded += 1,
            TargetResult::Failed => self.failed += 1,
        }
    }

    pub(crate) fn on_result_removed(&mut self, result: TargetResult) {
        match result {
            TargetResult::Succeeded => self.succeeded = self.succeeded.saturating_sub(1),
            TargetResult::Failed => self.failed = self.failed.saturating_sub(1),
        }
    }
}
