// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable record of a store operation that could not be committed to
//! the primary ticket store (§3 "FallbackQueueEntry").

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackOperation {
    Write,
    Append,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStatus {
    Pending,
    Replayed,
    Abandoned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackQueueEntry {
    pub entry_id: String,
    pub operation: FallbackOperation,
    /// Identifies the target row/record; paired with `operation` for dedup.
    pub key: String,
    pub content: serde_json::Value,
    pub created_at_ms: i64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub last_retry_ms: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default = "default_status")]
    pub status: FallbackStatus,
}

fn default_status() -> FallbackStatus {
    FallbackStatus::Pending
}

impl FallbackQueueEntry {
    /// `(operation, key)` identifies the entry for deduplication —
    /// enqueuing the same pair again updates rather than duplicates.
    pub fn dedup_key(&self) -> (FallbackOperation, &str) {
        (self.operation, self.key.as_str())
    }
}
