// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake process launcher for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::sync::Arc;

use parking_lot::Mutex;

use super::{LaunchCommand, LaunchError, ProcessLauncher, WorkerProcess};

#[derive(Debug, Default)]
struct FakeProcessState {
    alive: bool,
    killed: bool,
    probes: usize,
}

/// Test-side handle to a fake process.
#[derive(Debug, Clone)]
pub struct FakeProcessHandle {
    state: Arc<Mutex<FakeProcessState>>,
}

impl FakeProcessHandle {
    /// Simulate the process exiting on its own.
    pub fn exit(&self) {
        self.state.lock().alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.state.lock().alive
    }

    pub fn was_killed(&self) -> bool {
        self.state.lock().killed
    }

    /// Number of liveness probes performed by the director.
    pub fn probes(&self) -> usize {
        self.state.lock().probes
    }
}

struct FakeProcess {
    pid: u32,
    state: Arc<Mutex<FakeProcessState>>,
}

impl WorkerProcess for FakeProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_running(&mut self) -> bool {
        let mut state = self.state.lock();
        state.probes += 1;
        state.alive
    }

    fn kill(&mut self) {
        let mut state = self.state.lock();
        state.killed = true;
        state.alive = false;
    }
}

#[derive(Default)]
struct FakeLauncherState {
    launches: Vec<LaunchCommand>,
    processes: Vec<FakeProcessHandle>,
    refuse: Option<String>,
}

/// Fake launcher recording every launch and handing out controllable processes.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    inner: Arc<Mutex<FakeLauncherState>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent launch fail with `reason`.
    pub fn refuse_launches(&self, reason: &str) {
        self.inner.lock().refuse = Some(reason.to_string());
    }

    pub fn allow_launches(&self) {
        self.inner.lock().refuse = None;
    }

    pub fn launches(&self) -> Vec<LaunchCommand> {
        self.inner.lock().launches.clone()
    }

    /// Handle for the `n`th successfully launched process.
    pub fn process(&self, n: usize) -> Option<FakeProcessHandle> {
        self.inner.lock().processes.get(n).cloned()
    }

    pub fn num_processes(&self) -> usize {
        self.inner.lock().processes.len()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<Box<dyn WorkerProcess>, LaunchError> {
        let mut inner = self.inner.lock();
        inner.launches.push(command.clone());
        if let Some(reason) = &inner.refuse {
            return Err(LaunchError::Refused(reason.clone()));
        }
        let state = Arc::new(Mutex::new(FakeProcessState {
            alive: true,
            ..FakeProcessState::default()
        }));
        inner.processes.push(FakeProcessHandle {
            state: Arc::clone(&state),
        });
        let pid = 10_000 + inner.processes.len() as u32;
        Ok(Box::new(FakeProcess { pid, state }))
    }
}
