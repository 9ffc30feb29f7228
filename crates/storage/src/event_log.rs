// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C5: the append-only event log.
//!
//! Events are immutable facts (`ACT-*` ticket lifecycle events, webhook
//! delivery outcomes, AI provider calls, ...). Unlike the ticket store,
//! there is no mutation to apply on replay — recovery just re-reads the
//! WAL into the in-memory ring buffer used for queries.

use crate::wal::{Wal, WalError};
use actifix_core::{Event, EventFilter};
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error(transparent)]
    Wal(#[from] WalError),
}

/// Caps in-memory retention so a long-running daemon doesn't grow
/// unbounded; older events remain durable in the WAL/rotated files.
const MAX_RETAINED: usize = 50_000;

struct Inner {
    wal: Wal<Event>,
    events: Vec<Event>,
    next_id: u64,
}

pub struct EventLog {
    inner: Mutex<Inner>,
}

impl EventLog {
    pub fn open(wal_path: &Path) -> Result<Self, EventLogError> {
        let wal = Wal::open(wal_path, 0)?;
        let mut events = Vec::new();
        let mut next_id = 1;
        for entry in wal.entries_after(0)? {
            let mut event = entry.event;
            event.id = next_id;
            next_id += 1;
            events.push(event);
        }
        if events.len() > MAX_RETAINED {
            let excess = events.len() - MAX_RETAINED;
            events.drain(0..excess);
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                wal,
                events,
                next_id,
            }),
        })
    }

    /// Append an event durably and return its assigned id.
    pub fn record(&self, mut event: Event) -> Result<u64, EventLogError> {
        let mut guard = self.inner.lock();
        let id = guard.next_id;
        event.id = id;
        guard.next_id += 1;
        guard.wal.append(&event)?;
        guard.wal.flush()?;
        guard.events.push(event);
        if guard.events.len() > MAX_RETAINED {
            guard.events.remove(0);
        }
        Ok(id)
    }

    pub fn query(&self, filter: &EventFilter) -> Vec<Event> {
        let guard = self.inner.lock();
        let mut matched: Vec<Event> = guard
            .events
            .iter()
            .rev()
            .filter(|e| matches_filter(e, filter))
            .cloned()
            .collect();

        if filter.offset > 0 {
            if filter.offset < matched.len() {
                matched.drain(0..filter.offset);
            } else {
                matched.clear();
            }
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        matched
    }

    pub fn len(&self) -> usize {
        self.inner.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn checkpoint(&self) -> Result<(), EventLogError> {
        let mut guard = self.inner.lock();
        let seq = guard.wal.write_seq();
        guard.wal.mark_processed(seq);
        guard.wal.truncate_before(seq)?;
        Ok(())
    }
}

fn matches_filter(e: &Event, filter: &EventFilter) -> bool {
    if let Some(t) = &filter.event_type {
        if &e.event_type != t {
            return false;
        }
    }
    if let Some(level) = filter.level {
        if e.level != level {
            return false;
        }
    }
    if let Some(ticket_id) = &filter.ticket_id {
        if e.ticket_id.as_ref() != Some(ticket_id) {
            return false;
        }
    }
    if let Some(correlation_id) = &filter.correlation_id {
        if e.correlation_id.as_deref() != Some(correlation_id.as_str()) {
            return false;
        }
    }
    if let Some(source) = &filter.source {
        if e.source.as_deref() != Some(source.as_str()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
