// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C4: the ticket store.
//!
//! An event-sourced store — a JSONL WAL of [`TicketOp`] mutations plus a
//! materialized, in-memory index rebuilt by replaying it — rather than an
//! embedded relational database. A single `parking_lot::Mutex` guards both
//! the WAL append and the index update so every mutating call commits as
//! one atomic, durable step; callers never observe a half-applied ticket.
//!
//! Grounded on the original `persistence/ticket_repo.py` for ordering and
//! locking semantics, and on this workspace's own `wal.rs`/`snapshot.rs`/
//! `checkpoint.rs` for the durability mechanism.

use crate::checkpoint::{load_snapshot, CheckpointError, Checkpointer};
use crate::wal::{Wal, WalError};
use actifix_core::{Priority, Ticket, TicketFilter, TicketId, TicketStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum TicketStoreError {
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Snapshot(#[from] crate::snapshot::SnapshotError),
    #[error("ticket {0} not found")]
    NotFound(TicketId),
    #[error("ticket {0} is locked by {1}")]
    AlreadyLocked(TicketId, String),
    #[error("lock on {0} is not held by {1}")]
    NotLockHolder(TicketId, String),
}

/// A durable mutation to the ticket index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TicketOp {
    Created {
        ticket: Box<Ticket>,
    },
    Locked {
        id: TicketId,
        locked_by: String,
        locked_at_ms: i64,
        lease_expires_ms: i64,
    },
    LockReleased {
        id: TicketId,
        released_by: String,
    },
    LockRenewed {
        id: TicketId,
        holder: String,
        lease_expires_ms: i64,
    },
    LocksExpired {
        ids: Vec<TicketId>,
    },
    ChecklistUpdated {
        id: TicketId,
        documented: bool,
        functioning: bool,
        tested: bool,
    },
    RemediationRecorded {
        id: TicketId,
        notes: String,
    },
    Completed {
        id: TicketId,
        completed_at_ms: i64,
        summary: Option<String>,
    },
    Deleted {
        id: TicketId,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketIndex {
    pub tickets: HashMap<String, Ticket>,
}

impl TicketIndex {
    pub fn apply(&mut self, op: &TicketOp) {
        match op {
            TicketOp::Created { ticket } => {
                // Idempotent: skip if duplicate_guard already has a row.
                if !self
                    .tickets
                    .values()
                    .any(|t| t.duplicate_guard == ticket.duplicate_guard)
                {
                    self.tickets.insert(ticket.id.as_str().to_string(), (**ticket).clone());
                }
            }
            TicketOp::Locked {
                id,
                locked_by,
                locked_at_ms,
                lease_expires_ms,
            } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.locked_by = Some(locked_by.clone());
                    t.locked_at_ms = Some(*locked_at_ms);
                    t.lease_expires_ms = Some(*lease_expires_ms);
                    t.status = TicketStatus::InProgress;
                    t.updated_at_ms = *locked_at_ms;
                }
            }
            TicketOp::LockReleased { id, .. } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.locked_by = None;
                    t.locked_at_ms = None;
                    t.lease_expires_ms = None;
                    if t.status == TicketStatus::InProgress {
                        t.status = TicketStatus::Open;
                    }
                }
            }
            TicketOp::LockRenewed {
                id,
                lease_expires_ms,
                ..
            } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.lease_expires_ms = Some(*lease_expires_ms);
                }
            }
            TicketOp::LocksExpired { ids } => {
                for id in ids {
                    if let Some(t) = self.tickets.get_mut(id.as_str()) {
                        t.locked_by = None;
                        t.locked_at_ms = None;
                        t.lease_expires_ms = None;
                        if t.status == TicketStatus::InProgress {
                            t.status = TicketStatus::Open;
                        }
                    }
                }
            }
            TicketOp::ChecklistUpdated {
                id,
                documented,
                functioning,
                tested,
            } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.documented = *documented;
                    t.functioning = *functioning;
                    t.tested = *tested;
                }
            }
            TicketOp::RemediationRecorded { id, notes } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.ai_remediation_notes = Some(notes.clone());
                }
            }
            TicketOp::Completed {
                id,
                completed_at_ms,
                summary,
            } => {
                if let Some(t) = self.tickets.get_mut(id.as_str()) {
                    t.status = TicketStatus::Completed;
                    t.completed = true;
                    t.documented = true;
                    t.functioning = true;
                    t.tested = true;
                    t.locked_by = None;
                    t.locked_at_ms = None;
                    t.lease_expires_ms = None;
                    t.updated_at_ms = *completed_at_ms;
                    t.completion_summary = summary.clone();
                }
            }
            TicketOp::Deleted { id } => {
                self.tickets.remove(id.as_str());
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TicketStats {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub by_priority: HashMap<String, usize>,
    pub locked: usize,
}

/// WAL-backed ticket store guarded by a single mutex for transactional
/// create/lock/claim/complete semantics.
pub struct TicketStore {
    inner: Mutex<Inner>,
}

struct Inner {
    wal: Wal<TicketOp>,
    index: TicketIndex,
    checkpointer: Checkpointer<TicketIndex>,
    snapshot_path: PathBuf,
}

impl TicketStore {
    pub fn open(wal_path: &Path, snapshot_path: &Path) -> Result<Self, TicketStoreError> {
        let loaded = load_snapshot::<TicketIndex>(snapshot_path, SNAPSHOT_VERSION)?;
        let (processed_seq, mut index) = match loaded {
            Some(snap) => (snap.seq, snap.state),
            None => (0, TicketIndex::default()),
        };

        let wal = Wal::open(wal_path, processed_seq)?;
        for entry in wal.entries_after(processed_seq)? {
            index.apply(&entry.event);
        }

        let checkpointer = Checkpointer::new(snapshot_path.to_path_buf(), SNAPSHOT_VERSION);

        Ok(Self {
            inner: Mutex::new(Inner {
                wal,
                index,
                checkpointer,
                snapshot_path: snapshot_path.to_path_buf(),
            }),
        })
    }

    fn commit(&self, guard: &mut Inner, op: TicketOp) -> Result<u64, TicketStoreError> {
        let seq = guard.wal.append(&op)?;
        guard.wal.flush()?;
        guard.index.apply(&op);
        Ok(seq)
    }

    /// Create a ticket. Returns `Ok(false)` (no error) if a ticket with
    /// the same `duplicate_guard` already exists, mirroring the original's
    /// `sqlite3.IntegrityError`-as-dedup-signal behavior.
    pub fn create_ticket(&self, ticket: Ticket) -> Result<bool, TicketStoreError> {
        let mut guard = self.inner.lock();
        if guard
            .index
            .tickets
            .values()
            .any(|t| t.duplicate_guard == ticket.duplicate_guard)
        {
            return Ok(false);
        }
        self.commit(
            &mut guard,
            TicketOp::Created {
                ticket: Box::new(ticket),
            },
        )?;
        Ok(true)
    }

    pub fn get_ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.inner.lock().index.tickets.get(id.as_str()).cloned()
    }

    /// List tickets matching `filter`, ordered by priority ordinal then
    /// `created_at` descending — matching the original's `CASE priority ...`
    /// ORDER BY clause.
    pub fn get_tickets(&self, filter: &TicketFilter) -> Vec<Ticket> {
        let guard = self.inner.lock();
        let mut tickets: Vec<Ticket> = guard
            .index
            .tickets
            .values()
            .filter(|t| matches_filter(t, filter))
            .cloned()
            .collect();

        tickets.sort_by(|a, b| {
            a.priority
                .ordinal()
                .cmp(&b.priority.ordinal())
                .then(b.created_at_ms.cmp(&a.created_at_ms))
        });

        if filter.offset > 0 {
            if filter.offset < tickets.len() {
                tickets.drain(0..filter.offset);
            } else {
                tickets.clear();
            }
        }
        if let Some(limit) = filter.limit {
            tickets.truncate(limit);
        }
        tickets
    }

    /// Atomically find the next claimable ticket for `priority_filter` (or
    /// any priority), clean up expired leases, and lock it to `locked_by`.
    pub fn get_and_lock_next_ticket(
        &self,
        locked_by: &str,
        now_ms: i64,
        lease_duration_ms: i64,
        priority_filter: Option<Priority>,
    ) -> Result<Option<Ticket>, TicketStoreError> {
        let mut guard = self.inner.lock();

        let expired: Vec<TicketId> = guard
            .index
            .tickets
            .values()
            .filter(|t| {
                t.locked_by.is_some() && t.lease_expires_ms.map(|exp| exp < now_ms).unwrap_or(false)
            })
            .map(|t| t.id.clone())
            .collect();
        if !expired.is_empty() {
            self.commit(&mut guard, TicketOp::LocksExpired { ids: expired })?;
        }

        let mut candidates: Vec<&Ticket> = guard
            .index
            .tickets
            .values()
            .filter(|t| t.is_claimable())
            .filter(|t| priority_filter.map(|p| t.priority == p).unwrap_or(true))
            .collect();
        candidates.sort_by(|a, b| {
            a.priority
                .ordinal()
                .cmp(&b.priority.ordinal())
                .then(a.created_at_ms.cmp(&b.created_at_ms))
        });

        let Some(chosen) = candidates.first().map(|t| t.id.clone()) else {
            return Ok(None);
        };

        self.commit(
            &mut guard,
            TicketOp::Locked {
                id: chosen.clone(),
                locked_by: locked_by.to_string(),
                locked_at_ms: now_ms,
                lease_expires_ms: now_ms + lease_duration_ms,
            },
        )?;

        Ok(guard.index.tickets.get(chosen.as_str()).cloned())
    }

    pub fn acquire_lock(
        &self,
        id: &TicketId,
        holder: &str,
        now_ms: i64,
        lease_duration_ms: i64,
    ) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        let ticket = guard
            .index
            .tickets
            .get(id.as_str())
            .ok_or_else(|| TicketStoreError::NotFound(id.clone()))?;
        if let Some(existing) = &ticket.locked_by {
            if existing != holder && ticket.lease_expires_ms.map(|e| e >= now_ms).unwrap_or(false) {
                return Err(TicketStoreError::AlreadyLocked(id.clone(), existing.clone()));
            }
        }
        self.commit(
            &mut guard,
            TicketOp::Locked {
                id: id.clone(),
                locked_by: holder.to_string(),
                locked_at_ms: now_ms,
                lease_expires_ms: now_ms + lease_duration_ms,
            },
        )?;
        Ok(())
    }

    pub fn release_lock(&self, id: &TicketId, holder: &str) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        let ticket = guard
            .index
            .tickets
            .get(id.as_str())
            .ok_or_else(|| TicketStoreError::NotFound(id.clone()))?;
        match &ticket.locked_by {
            Some(h) if h == holder => {}
            Some(h) => return Err(TicketStoreError::NotLockHolder(id.clone(), h.clone())),
            None => return Ok(()),
        }
        self.commit(
            &mut guard,
            TicketOp::LockReleased {
                id: id.clone(),
                released_by: holder.to_string(),
            },
        )?;
        Ok(())
    }

    pub fn renew_lock(
        &self,
        id: &TicketId,
        holder: &str,
        now_ms: i64,
        lease_duration_ms: i64,
    ) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        let ticket = guard
            .index
            .tickets
            .get(id.as_str())
            .ok_or_else(|| TicketStoreError::NotFound(id.clone()))?;
        match &ticket.locked_by {
            Some(h) if h == holder => {}
            Some(h) => return Err(TicketStoreError::NotLockHolder(id.clone(), h.clone())),
            None => return Err(TicketStoreError::NotLockHolder(id.clone(), String::new())),
        }
        self.commit(
            &mut guard,
            TicketOp::LockRenewed {
                id: id.clone(),
                holder: holder.to_string(),
                lease_expires_ms: now_ms + lease_duration_ms,
            },
        )?;
        Ok(())
    }

    pub fn update_checklist(
        &self,
        id: &TicketId,
        documented: bool,
        functioning: bool,
        tested: bool,
    ) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        if !guard.index.tickets.contains_key(id.as_str()) {
            return Err(TicketStoreError::NotFound(id.clone()));
        }
        self.commit(
            &mut guard,
            TicketOp::ChecklistUpdated {
                id: id.clone(),
                documented,
                functioning,
                tested,
            },
        )?;
        Ok(())
    }

    pub fn record_remediation_notes(&self, id: &TicketId, notes: &str) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        if !guard.index.tickets.contains_key(id.as_str()) {
            return Err(TicketStoreError::NotFound(id.clone()));
        }
        self.commit(
            &mut guard,
            TicketOp::RemediationRecorded {
                id: id.clone(),
                notes: notes.to_string(),
            },
        )?;
        Ok(())
    }

    /// Mark a ticket fully complete: sets all four checklist flags and
    /// clears any lock, matching `mark_complete` in the original.
    pub fn mark_complete(
        &self,
        id: &TicketId,
        now_ms: i64,
        summary: Option<String>,
    ) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        if !guard.index.tickets.contains_key(id.as_str()) {
            return Err(TicketStoreError::NotFound(id.clone()));
        }
        self.commit(
            &mut guard,
            TicketOp::Completed {
                id: id.clone(),
                completed_at_ms: now_ms,
                summary,
            },
        )?;
        Ok(())
    }

    pub fn delete_ticket(&self, id: &TicketId) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        self.commit(&mut guard, TicketOp::Deleted { id: id.clone() })?;
        Ok(())
    }

    pub fn get_stats(&self) -> TicketStats {
        let guard = self.inner.lock();
        let mut stats = TicketStats {
            total: guard.index.tickets.len(),
            ..Default::default()
        };
        for t in guard.index.tickets.values() {
            *stats.by_status.entry(t.status.as_str().to_string()).or_insert(0) += 1;
            *stats.by_priority.entry(t.priority.as_str().to_string()).or_insert(0) += 1;
            if t.locked_by.is_some() {
                stats.locked += 1;
            }
        }
        stats
    }

    /// Checkpoint the current index and truncate the WAL up to the
    /// checkpointed sequence number.
    pub fn checkpoint(&self) -> Result<(), TicketStoreError> {
        let mut guard = self.inner.lock();
        let seq = guard.wal.write_seq();
        let snapshot_path = guard.snapshot_path.clone();
        let result = guard.checkpointer.checkpoint_sync(seq, &guard.index.clone())?;
        guard.wal.mark_processed(result.seq);
        guard.wal.truncate_before(result.seq)?;
        let _ = snapshot_path;
        Ok(())
    }
}

fn matches_filter(t: &Ticket, filter: &TicketFilter) -> bool {
    if let Some(status) = &filter.status {
        if t.status != *status {
            return false;
        }
    }
    if let Some(priority) = filter.priority {
        if t.priority != priority {
            return false;
        }
    }
    if let Some(owner) = &filter.owner {
        if t.owner.as_deref() != Some(owner.as_str()) {
            return false;
        }
    }
    if let Some(locked) = filter.locked {
        if t.locked_by.is_some() != locked {
            return false;
        }
    }
    if let Some(after) = filter.created_after_ms {
        if t.created_at_ms < after {
            return false;
        }
    }
    if let Some(before) = filter.created_before_ms {
        if t.created_at_ms > before {
            return false;
        }
    }
    if let Some(correlation_id) = &filter.correlation_id {
        if t.correlation_id.as_deref() != Some(correlation_id.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "ticket_store_tests.rs"]
mod tests;
