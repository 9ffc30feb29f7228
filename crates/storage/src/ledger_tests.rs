// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use actifix_core::{Priority, TicketCreation};
use tempfile::tempdir;

fn creation(timestamp_ms: i64, priority: Priority) -> TicketCreation {
    TicketCreation {
        priority,
        timestamp_ms,
        ticket_id: None,
        error_type: None,
    }
}

#[test]
fn record_and_count_since_respects_priority_predicate() {
    let dir = tempdir().unwrap();
    let ledger: Ledger<TicketCreation> =
        Ledger::open(&dir.path().join("throttle.wal"), 3_600_000, 10_000).unwrap();

    ledger.record(creation(1_000, Priority::P2)).unwrap();
    ledger.record(creation(2_000, Priority::P2)).unwrap();
    ledger.record(creation(3_000, Priority::P3)).unwrap();

    let p2_count = ledger.count_since(0, |e| e.priority == Priority::P2);
    assert_eq!(p2_count, 2);
    assert_eq!(ledger.len(), 3);
}

#[test]
fn entries_older_than_retention_window_are_pruned_on_record() {
    let dir = tempdir().unwrap();
    let ledger: Ledger<TicketCreation> =
        Ledger::open(&dir.path().join("throttle.wal"), 1_000, 0).unwrap();

    ledger.record(creation(0, Priority::P4)).unwrap();
    // this append's cutoff (5_000 - 1_000 = 4_000) drops the first entry
    ledger.record(creation(5_000, Priority::P4)).unwrap();

    assert_eq!(ledger.len(), 1);
}

#[test]
fn open_with_existing_wal_applies_retention_window_from_now_ms() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("throttle.wal");
    {
        let ledger: Ledger<TicketCreation> = Ledger::open(&path, 1_000, 0).unwrap();
        ledger.record(creation(0, Priority::P4)).unwrap();
        ledger.record(creation(500, Priority::P4)).unwrap();
    }

    let reopened: Ledger<TicketCreation> = Ledger::open(&path, 1_000, 10_000).unwrap();
    assert_eq!(reopened.len(), 0);
}

#[test]
fn prune_drops_stale_entries_without_touching_wal() {
    let dir = tempdir().unwrap();
    let ledger: Ledger<TicketCreation> =
        Ledger::open(&dir.path().join("throttle.wal"), 1_000, 0).unwrap();
    ledger.record(creation(0, Priority::P4)).unwrap();
    ledger.prune(5_000);
    assert_eq!(ledger.len(), 0);
}

#[test]
fn checkpoint_truncates_wal_but_keeps_in_memory_entries() {
    let dir = tempdir().unwrap();
    let ledger: Ledger<TicketCreation> =
        Ledger::open(&dir.path().join("throttle.wal"), 3_600_000, 0).unwrap();
    ledger.record(creation(0, Priority::P2)).unwrap();
    ledger.checkpoint().unwrap();
    assert_eq!(ledger.len(), 1);
}
