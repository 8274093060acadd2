// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: worker processes, byte transports, subprocesses

pub mod process;
pub mod subprocess;
pub mod transport;

pub use process::{
    ChildProcess, LaunchCommand, LaunchError, ProcessLauncher, TokioLauncher, WorkerProcess,
};
pub use subprocess::{run_with_timeout, shell_command, SubprocessError, BUILD_COMMAND_TIMEOUT};
pub use transport::{is_transient, Acceptor, TcpTransport, Transport};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use process::{FakeLauncher, FakeProcessHandle};
#[cfg(any(test, feature = "test-support"))]
pub use transport::{MemoryAcceptor, MemoryConnector, MemoryTransport};
