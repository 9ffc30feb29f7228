// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplicate-ticket cleanup: open tickets that share `(message, source,
//! error_type)` are almost always the same underlying bug reported
//! more than once. Keeps the newest of each group open and auto-closes
//! the rest once they've sat long enough that a human had a chance to
//! notice, unless they're locked (someone's already working the fix).

use std::collections::HashMap;

use actifix_core::{Ticket, TicketFilter, TicketId, TicketStatus};

use crate::ticket_store::{TicketStore, TicketStoreError};

/// Tally from a single `cleanup_duplicate_tickets` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketCleanupReport {
    pub duplicate_groups: usize,
    pub duplicates_found: usize,
    pub duplicates_closed: usize,
    pub duplicates_skipped_locked: usize,
    pub duplicates_skipped_recent: usize,
}

/// Group open tickets by `(message, source, error_type)`; for any group
/// with more than one member, keep the newest open and close the rest
/// once they're older than `min_age_hours`, unless locked. With
/// `dry_run` set, tallies what would happen without mutating anything.
pub fn cleanup_duplicate_tickets(
    store: &TicketStore,
    min_age_hours: f64,
    dry_run: bool,
    now_ms: i64,
) -> Result<TicketCleanupReport, TicketStoreError> {
    let open = store.get_tickets(&TicketFilter {
        status: Some(TicketStatus::Open),
        ..Default::default()
    });

    let mut groups: HashMap<(String, String, String), Vec<Ticket>> = HashMap::new();
    for ticket in open {
        let key = (ticket.message.clone(), ticket.source.clone(), ticket.error_type.clone());
        groups.entry(key).or_default().push(ticket);
    }

    let mut report = TicketCleanupReport::default();

    for (_key, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        report.duplicate_groups += 1;

        // Newest first; the head stays open, the rest are candidates.
        members.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        let (newest, duplicates) = members.split_first().expect("len >= 2 checked above");
        let newest_id = newest.id.clone();

        for dup in duplicates {
            report.duplicates_found += 1;

            if dup.locked_by.is_some() {
                report.duplicates_skipped_locked += 1;
                continue;
            }

            let age_hours = dup.sla_hours_elapsed(now_ms);
            if age_hours < min_age_hours {
                report.duplicates_skipped_recent += 1;
                continue;
            }

            report.duplicates_closed += 1;
            if !dry_run {
                close_duplicate(store, &dup.id, &newest_id, now_ms)?;
            }
        }
    }

    Ok(report)
}

fn close_duplicate(
    store: &TicketStore,
    id: &TicketId,
    newest_id: &TicketId,
    now_ms: i64,
) -> Result<(), TicketStoreError> {
    let summary = format!(
        "Auto-completed stale duplicate ticket; newer ticket remains open (latest id {newest_id}).",
    );
    store.mark_complete(id, now_ms, Some(summary))
}
