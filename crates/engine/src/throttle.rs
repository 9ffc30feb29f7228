// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C7: the ticket-creation throttler.
//!
//! Enforces per-priority rolling-window caps on ticket *creation* and a
//! priority-agnostic emergency brake that blocks all non-critical
//! creation once too many tickets land in a short window. P0/P1 are
//! never throttled.
//!
//! Backed by `actifix_storage::Ledger<TicketCreation>`: the in-memory
//! window gives O(1)-ish rolling counts, the WAL behind it is the
//! durable `ticket_creations` record the spec describes.
//!
//! Grounded on `security/ticket_throttler.py`'s `TicketThrottler`.

use crate::error::ThrottleError;
use actifix_core::{Config, Priority, TicketCreation};
use actifix_storage::{Ledger, LedgerError};
use std::path::Path;

const ONE_HOUR_MS: i64 = 3_600_000;
const FOUR_HOURS_MS: i64 = 4 * ONE_HOUR_MS;
const ONE_DAY_MS: i64 = 24 * ONE_HOUR_MS;

pub struct Throttler {
    ledger: Ledger<TicketCreation>,
    max_p2_per_hour: u32,
    max_p3_per_4h: u32,
    max_p4_per_day: u32,
    emergency_threshold: u32,
    emergency_window_ms: i64,
}

impl Throttler {
    pub fn open(wal_path: &Path, config: &Config, now_ms: i64) -> Result<Self, LedgerError> {
        let ledger = Ledger::open(wal_path, ONE_DAY_MS, now_ms)?;
        Ok(Self {
            ledger,
            max_p2_per_hour: config.max_p2_tickets_per_hour,
            max_p3_per_4h: config.max_p3_tickets_per_4h,
            max_p4_per_day: config.max_p4_tickets_per_day,
            emergency_threshold: config.emergency_ticket_threshold,
            emergency_window_ms: config.emergency_window_minutes as i64 * 60_000,
        })
    }

    /// Raise a typed error if creating a ticket of `priority` now would
    /// exceed a throttle limit. Never throttles P0/P1.
    pub fn check(&self, priority: Priority, now_ms: i64) -> Result<(), ThrottleError> {
        let emergency_start = now_ms - self.emergency_window_ms;
        let total_recent = self.ledger.count_since(emergency_start, |e| {
            matches!(e.priority, Priority::P2 | Priority::P3 | Priority::P4)
        }) as u32;
        if total_recent >= self.emergency_threshold {
            return Err(ThrottleError::EmergencyBrake {
                count: total_recent,
                threshold: self.emergency_threshold,
                window_minutes: (self.emergency_window_ms / 60_000) as u32,
            });
        }

        match priority {
            Priority::P0 | Priority::P1 => Ok(()),
            Priority::P2 => self.check_window(
                priority,
                now_ms - ONE_HOUR_MS,
                self.max_p2_per_hour,
                "hour",
            ),
            Priority::P3 => self.check_window(
                priority,
                now_ms - FOUR_HOURS_MS,
                self.max_p3_per_4h,
                "4 hours",
            ),
            Priority::P4 => self.check_window(
                priority,
                now_ms - ONE_DAY_MS,
                self.max_p4_per_day,
                "day",
            ),
        }
    }

    fn check_window(
        &self,
        priority: Priority,
        since_ms: i64,
        limit: u32,
        window: &'static str,
    ) -> Result<(), ThrottleError> {
        let count = self.ledger.count_since(since_ms, |e| e.priority == priority) as u32;
        if count >= limit {
            return Err(ThrottleError::PriorityCapExceeded {
                priority: priority.as_str(),
                count,
                limit,
                window,
            });
        }
        Ok(())
    }

    /// Record a ticket creation for future throttle window checks.
    pub fn record(
        &self,
        priority: Priority,
        ticket_id: Option<String>,
        error_type: Option<String>,
        now_ms: i64,
    ) -> Result<(), LedgerError> {
        self.ledger.record(TicketCreation {
            priority,
            timestamp_ms: now_ms,
            ticket_id,
            error_type,
        })
    }

    pub fn checkpoint(&self) -> Result<(), LedgerError> {
        self.ledger.checkpoint()
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
