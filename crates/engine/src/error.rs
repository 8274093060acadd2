// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use cook_adapters::SubprocessError;
use cook_core::ItemName;
use cook_storage::StoreError;
use thiserror::Error;

/// Errors reported by a build executor
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to load {item}: {message}")]
    Load { item: ItemName, message: String },
    #[error(transparent)]
    Subprocess(#[from] SubprocessError),
}

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runtime is no longer accepting requests")]
    Closed,
}
