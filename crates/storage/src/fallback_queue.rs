// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C6: the fallback queue.
//!
//! When a store operation can't be committed to the ticket store or
//! event log (disk full, a transient WAL error), it is enqueued here
//! instead as a flat JSON array written atomically. Unlike the WAL-backed
//! stores, the whole queue is rewritten on every mutation — entry counts
//! are small and bounded by `max_entries`, so there's no group-commit
//! benefit to chasing.
//!
//! Grounded on `persistence/queue.py`'s `PersistenceQueue`.

use crate::atomic::{atomic_write, AtomicWriteError};
use actifix_core::{FallbackOperation, FallbackQueueEntry, FallbackStatus};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FallbackQueueError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Write(#[from] AtomicWriteError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of replaying the queue against a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

struct Inner {
    entries: Vec<FallbackQueueEntry>,
    path: PathBuf,
}

/// JSON-array-backed fallback queue, atomically rewritten on mutation.
pub struct FallbackQueue {
    inner: Mutex<Inner>,
    max_entries: usize,
    max_age_ms: i64,
}

impl FallbackQueue {
    /// Open (or create) the queue file, pruning entries older than
    /// `max_age_ms`. A corrupt queue file starts fresh rather than
    /// failing open, matching the original's recovery behavior.
    pub fn open(path: &Path, max_entries: usize, max_age_ms: i64, now_ms: i64) -> Result<Self, FallbackQueueError> {
        let mut entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<Vec<FallbackQueueEntry>>(&content).unwrap_or_default()
        } else {
            Vec::new()
        };
        let cutoff = now_ms - max_age_ms;
        entries.retain(|e| e.created_at_ms > cutoff);

        Ok(Self {
            inner: Mutex::new(Inner {
                entries,
                path: path.to_path_buf(),
            }),
            max_entries,
            max_age_ms,
        })
    }

    fn save(inner: &Inner) -> Result<(), FallbackQueueError> {
        let content = serde_json::to_string_pretty(&inner.entries)?;
        atomic_write(&inner.path, &content)?;
        Ok(())
    }

    /// Enqueue an operation. If an entry with the same `(operation, key)`
    /// already exists, it is updated in place rather than duplicated.
    pub fn enqueue(
        &self,
        entry_id: String,
        operation: FallbackOperation,
        key: &str,
        content: serde_json::Value,
        created_at_ms: i64,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<String, FallbackQueueError> {
        let mut guard = self.inner.lock();

        if let Some(existing) = guard
            .entries
            .iter_mut()
            .find(|e| e.operation == operation && e.key == key)
        {
            existing.content = content;
            existing.metadata = metadata;
            existing.last_retry_ms = Some(created_at_ms);
            let id = existing.entry_id.clone();
            Self::save(&guard)?;
            return Ok(id);
        }

        if guard.entries.len() >= self.max_entries {
            guard.entries.remove(0);
        }

        guard.entries.push(FallbackQueueEntry {
            entry_id: entry_id.clone(),
            operation,
            key: key.to_string(),
            content,
            created_at_ms,
            retry_count: 0,
            last_retry_ms: None,
            metadata,
            status: FallbackStatus::Pending,
        });
        Self::save(&guard)?;
        Ok(entry_id)
    }

    /// Remove and return the entry with `entry_id`, if present.
    pub fn dequeue(&self, entry_id: &str) -> Result<Option<FallbackQueueEntry>, FallbackQueueError> {
        let mut guard = self.inner.lock();
        let Some(pos) = guard.entries.iter().position(|e| e.entry_id == entry_id) else {
            return Ok(None);
        };
        let removed = guard.entries.remove(pos);
        Self::save(&guard)?;
        Ok(Some(removed))
    }

    /// View the oldest `count` entries without removing them.
    pub fn peek(&self, count: usize) -> Vec<FallbackQueueEntry> {
        let guard = self.inner.lock();
        guard.entries.iter().take(count).cloned().collect()
    }

    /// Drop entries older than `now_ms - max_age_ms`.
    pub fn prune(&self, now_ms: i64) -> Result<usize, FallbackQueueError> {
        let mut guard = self.inner.lock();
        let cutoff = now_ms - self.max_age_ms;
        let before = guard.entries.len();
        guard.entries.retain(|e| e.created_at_ms > cutoff);
        let pruned = before - guard.entries.len();
        if pruned > 0 {
            Self::save(&guard)?;
        }
        Ok(pruned)
    }

    /// Replay every queued entry through `handler`, dropping entries that
    /// succeed or that have exceeded `max_retries`, and persisting the
    /// incremented retry count for the rest.
    pub fn replay<F>(&self, mut handler: F, max_retries: u32, now_ms: i64) -> Result<ReplayStats, FallbackQueueError>
    where
        F: FnMut(&FallbackQueueEntry) -> bool,
    {
        let mut guard = self.inner.lock();
        let mut stats = ReplayStats::default();
        let mut remaining = Vec::with_capacity(guard.entries.len());

        for mut entry in std::mem::take(&mut guard.entries) {
            if entry.retry_count >= max_retries {
                entry.status = FallbackStatus::Abandoned;
                stats.skipped += 1;
                remaining.push(entry);
                continue;
            }
            if handler(&entry) {
                stats.succeeded += 1;
            } else {
                entry.retry_count += 1;
                entry.last_retry_ms = Some(now_ms);
                stats.failed += 1;
                remaining.push(entry);
            }
        }

        guard.entries = remaining;
        Self::save(&guard)?;
        Ok(stats)
    }

    /// Remove all entries, returning the count cleared.
    pub fn clear(&self) -> Result<usize, FallbackQueueError> {
        let mut guard = self.inner.lock();
        let count = guard.entries.len();
        guard.entries.clear();
        Self::save(&guard)?;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "fallback_queue_tests.rs"]
mod tests;
