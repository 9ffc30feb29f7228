// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-crash state capture (§3 "CrashSnapshot") and the small
//! lifecycle-state file the daemon uses to detect an unclean shutdown
//! on the next start (§4.15).

use serde::{Deserialize, Serialize};

/// The value written to `state_dir/app_state.json`'s `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppLifecycleState {
    Running,
    ShuttingDown,
    Healthy,
}

impl AppLifecycleState {
    /// A `running` value found at startup implies the previous process
    /// did not shut down cleanly.
    pub fn implies_unclean_shutdown(&self) -> bool {
        matches!(self, AppLifecycleState::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrashSnapshot {
    pub timestamp_ms: i64,
    pub app_state: AppLifecycleState,
    pub memory_mb: f64,
    pub db_size_bytes: u64,
    pub open_tx: u32,
    pub pending_writes: u32,
}
