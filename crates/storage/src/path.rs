// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Item name to file path normalization.

use std::path::PathBuf;

/// Derive the normalized relative file path for an item name.
///
/// Backslashes become separators; empty and `.` components are dropped.
pub fn normalize_file_path(name: &str) -> PathBuf {
    let normalized = name.trim().replace('\\', "/");
    normalized
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}
