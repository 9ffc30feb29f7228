// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable rolling-window ledger backing the throttle (C7) and rate
//! limiter (C8) accounting records (`TicketCreation`, `ApiCall`).
//!
//! Both components only ever care about "how many records landed in the
//! last N milliseconds", so the ledger keeps the full history in the WAL
//! for audit purposes but retains only entries newer than `max_age_ms` in
//! memory, pruning older ones on every write and on open.

use crate::wal::{Wal, WalError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// A timestamped record a `Ledger` can window over.
pub trait Timestamped {
    fn timestamp_ms(&self) -> i64;
}

impl Timestamped for actifix_core::ApiCall {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

impl Timestamped for actifix_core::TicketCreation {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }
}

struct Inner<T> {
    wal: Wal<T>,
    entries: Vec<T>,
}

/// WAL-backed append-only ledger with an in-memory retention window.
pub struct Ledger<T> {
    inner: Mutex<Inner<T>>,
    max_age_ms: i64,
}

impl<T: Serialize + DeserializeOwned + Clone + Timestamped> Ledger<T> {
    /// Open (or create) a ledger at `wal_path`, retaining in-memory
    /// entries no older than `max_age_ms` as of `now_ms`.
    pub fn open(wal_path: &Path, max_age_ms: i64, now_ms: i64) -> Result<Self, LedgerError> {
        let wal = Wal::open(wal_path, 0)?;
        let mut entries: Vec<T> = wal
            .entries_after(0)?
            .into_iter()
            .map(|e| e.event)
            .collect();
        let cutoff = now_ms - max_age_ms;
        entries.retain(|e| e.timestamp_ms() >= cutoff);

        Ok(Self {
            inner: Mutex::new(Inner { wal, entries }),
            max_age_ms,
        })
    }

    /// Append a record durably and prune anything now older than the
    /// retention window.
    pub fn record(&self, entry: T) -> Result<(), LedgerError> {
        let mut guard = self.inner.lock();
        let cutoff = entry.timestamp_ms() - self.max_age_ms;
        guard.wal.append(&entry)?;
        guard.wal.flush()?;
        guard.entries.retain(|e| e.timestamp_ms() >= cutoff);
        guard.entries.push(entry);
        Ok(())
    }

    /// Count of retained entries with `timestamp_ms >= since_ms` that
    /// satisfy `predicate`.
    pub fn count_since<F>(&self, since_ms: i64, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let guard = self.inner.lock();
        guard
            .entries
            .iter()
            .filter(|e| e.timestamp_ms() >= since_ms && predicate(e))
            .count()
    }

    /// Drop in-memory entries older than `now_ms - max_age_ms`. The WAL
    /// retains full history until `checkpoint` truncates it.
    pub fn prune(&self, now_ms: i64) {
        let cutoff = now_ms - self.max_age_ms;
        let mut guard = self.inner.lock();
        guard.entries.retain(|e| e.timestamp_ms() >= cutoff);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the WAL fully processed and truncate it; safe because the
    /// in-memory retained entries are the only ones callers query.
    pub fn checkpoint(&self) -> Result<(), LedgerError> {
        let mut guard = self.inner.lock();
        let seq = guard.wal.write_seq();
        guard.wal.mark_processed(seq);
        guard.wal.truncate_before(seq)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
