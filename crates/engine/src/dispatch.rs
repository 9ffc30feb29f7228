// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C10: the dispatcher. Claims the next open ticket, hands it to a
//! fix handler, and reconciles the result back into the ticket store
//! and event log.
//!
//! Grounded on the worker claim/dispatch/complete-or-release state
//! machine in `runtime/handlers/worker/dispatch.rs` and `polling.rs`,
//! generalized from queue-item-to-job dispatch onto ticket-to-fix
//! dispatch.

use actifix_core::{Clock, Event, EventLevel, Priority, Ticket, TicketId};
use actifix_storage::{EventLog, TicketStore, TicketStoreError};
use std::sync::Arc;

/// Outcome of a fix attempt. `accepted = true` means the ticket should
/// be marked complete.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub accepted: bool,
    pub summary: Option<String>,
}

/// A handler that attempts to fix a ticket. The production handler
/// (built in the daemon, where an async runtime is available to drive
/// C11's provider calls) bridges to `actifix_adapters::ai::AiClient`;
/// tests and the CLI's dry-run path can supply a trivial one instead.
pub trait FixHandler: Send + Sync {
    fn handle(&self, ticket: &Ticket) -> DispatchOutcome;
}

pub struct Dispatcher<C: Clock> {
    ticket_store: Arc<TicketStore>,
    event_log: Arc<EventLog>,
    clock: Arc<C>,
    worker_id: String,
    lease_ms: i64,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(
        ticket_store: Arc<TicketStore>,
        event_log: Arc<EventLog>,
        clock: Arc<C>,
        worker_id: impl Into<String>,
        lease_ms: i64,
    ) -> Self {
        Self {
            ticket_store,
            event_log,
            clock,
            worker_id: worker_id.into(),
            lease_ms,
        }
    }

    /// Claim and dispatch a single ticket. Returns `Ok(false)` (not an
    /// error) when there was nothing to claim.
    pub fn process_next_ticket(
        &self,
        handler: &dyn FixHandler,
        priority_filter: Option<Priority>,
    ) -> Result<bool, TicketStoreError> {
        let now_ms = self.clock.now_ms();
        let Some(ticket) = self.ticket_store.get_and_lock_next_ticket(
            &self.worker_id,
            now_ms,
            self.lease_ms,
            priority_filter,
        )?
        else {
            let _ = self.event_log.record(Event::new(
                "NO_TICKETS",
                EventLevel::Debug,
                "no claimable tickets",
            ));
            return Ok(false);
        };

        let _ = self.event_log.record(
            Event::new("DISPATCH_STARTED", EventLevel::Info, format!("dispatching {}", ticket.id))
                .with_ticket(ticket.id.clone()),
        );

        let outcome = handler.handle(&ticket);
        if outcome.accepted {
            self.complete(&ticket.id, outcome.summary)?;
        } else {
            self.fail(&ticket.id, "handler declined the fix")?;
        }
        Ok(true)
    }

    /// Dispatch up to `max` tickets, stopping early once the queue is
    /// empty. Returns the number actually dispatched.
    pub fn process_tickets(&self, max: usize, handler: &dyn FixHandler) -> Result<usize, TicketStoreError> {
        let mut dispatched = 0;
        while dispatched < max {
            if !self.process_next_ticket(handler, None)? {
                break;
            }
            dispatched += 1;
        }
        Ok(dispatched)
    }

    fn complete(&self, id: &TicketId, summary: Option<String>) -> Result<(), TicketStoreError> {
        let now_ms = self.clock.now_ms();
        self.ticket_store.mark_complete(id, now_ms, summary)?;
        let _ = self.event_log.record(
            Event::new("DISPATCH_SUCCESS", EventLevel::Info, format!("fix accepted for {id}"))
                .with_ticket(id.clone()),
        );
        let _ = self.event_log.record(
            Event::new("TICKET_COMPLETED", EventLevel::Info, format!("{id} completed")).with_ticket(id.clone()),
        );
        Ok(())
    }

    fn fail(&self, id: &TicketId, reason: &str) -> Result<(), TicketStoreError> {
        let _ = self.event_log.record(
            Event::new("DISPATCH_FAILED", EventLevel::Warning, format!("{id}: {reason}")).with_ticket(id.clone()),
        );
        // Release rather than leave it locked until lease expiry; a
        // failed attempt shouldn't block the next worker's poll.
        self.ticket_store.release_lock(id, &self.worker_id)
    }
}

/// Exponential backoff schedule for the dispatch ceiling: 1s, 2s, 4s,
/// ... capped at `ceiling_ms`. C11's adapters mirror this schedule for
/// their own per-provider retries.
pub fn backoff_ms(attempt: u32, ceiling_ms: u64) -> u64 {
    let delay = 1000u64.saturating_mul(1u64 << attempt.min(20));
    delay.min(ceiling_ms)
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
