// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use actifix_core::{IdGen, Priority, TicketStatus, UuidIdGen};
use tempfile::tempdir;

fn sample_ticket(duplicate_guard: &str, priority: Priority, created_at_ms: i64) -> Ticket {
    Ticket {
        id: TicketId::new(UuidIdGen.next()),
        duplicate_guard: duplicate_guard.to_string(),
        priority,
        error_type: "RuntimeError".to_string(),
        message: "boom".to_string(),
        source: "test".to_string(),
        run_label: "unknown".to_string(),
        correlation_id: None,
        created_at_ms,
        updated_at_ms: created_at_ms,
        format_version: 1,
        status: TicketStatus::Open,
        documented: false,
        functioning: false,
        tested: false,
        completed: false,
        locked_by: None,
        locked_at_ms: None,
        lease_expires_ms: None,
        owner: None,
        branch: None,
        stack_trace: None,
        file_context: Default::default(),
        system_state: Default::default(),
        ai_remediation_notes: None,
        completion_summary: None,
    }
}

fn open_store(dir: &tempfile::TempDir) -> TicketStore {
    TicketStore::open(&dir.path().join("tickets.wal"), &dir.path().join("tickets.snap")).unwrap()
}

#[test]
fn create_ticket_rejects_duplicate_guard() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    let t1 = sample_ticket("ACTIFIX-boom-aaaa1111", Priority::P2, 1000);
    let t2 = sample_ticket("ACTIFIX-boom-aaaa1111", Priority::P2, 2000);

    assert!(store.create_ticket(t1).unwrap());
    assert!(!store.create_ticket(t2).unwrap());
    assert_eq!(store.get_stats().total, 1);
}

#[test]
fn get_tickets_orders_by_priority_then_created_at_desc() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    store.create_ticket(sample_ticket("g1", Priority::P2, 1000)).unwrap();
    store.create_ticket(sample_ticket("g2", Priority::P0, 2000)).unwrap();
    store.create_ticket(sample_ticket("g3", Priority::P0, 3000)).unwrap();

    let tickets = store.get_tickets(&TicketFilter::default());
    assert_eq!(tickets[0].duplicate_guard, "g3");
    assert_eq!(tickets[1].duplicate_guard, "g2");
    assert_eq!(tickets[2].duplicate_guard, "g1");
}

#[test]
fn get_and_lock_next_ticket_claims_highest_priority_oldest_first() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);

    store.create_ticket(sample_ticket("g1", Priority::P1, 1000)).unwrap();
    store.create_ticket(sample_ticket("g2", Priority::P0, 2000)).unwrap();
    store.create_ticket(sample_ticket("g3", Priority::P0, 1500)).unwrap();

    let locked = store
        .get_and_lock_next_ticket("worker-1", 5000, 60_000, None)
        .unwrap()
        .unwrap();
    assert_eq!(locked.duplicate_guard, "g3");
    assert_eq!(locked.locked_by.as_deref(), Some("worker-1"));
    assert_eq!(locked.status, TicketStatus::InProgress);
}

#[test]
fn expired_leases_are_reclaimed_on_next_claim() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    store.create_ticket(sample_ticket("g1", Priority::P2, 1000)).unwrap();

    let first = store
        .get_and_lock_next_ticket("worker-1", 1000, 1000, None)
        .unwrap()
        .unwrap();
    assert_eq!(first.locked_by.as_deref(), Some("worker-1"));

    // past the lease_expires_ms of 2000
    let second = store
        .get_and_lock_next_ticket("worker-2", 5000, 1000, None)
        .unwrap()
        .unwrap();
    assert_eq!(second.locked_by.as_deref(), Some("worker-2"));
}

#[test]
fn mark_complete_sets_all_checklist_flags_and_clears_lock() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    store.create_ticket(sample_ticket("g1", Priority::P2, 1000)).unwrap();
    let ticket = store.get_tickets(&TicketFilter::default()).remove(0);

    store.acquire_lock(&ticket.id, "worker-1", 1000, 60_000).unwrap();
    store
        .mark_complete(&ticket.id, 2000, Some("fixed it".to_string()))
        .unwrap();

    let done = store.get_ticket(&ticket.id).unwrap();
    assert_eq!(done.status, TicketStatus::Completed);
    assert!(done.checklist_complete());
    assert!(done.locked_by.is_none());
}

#[test]
fn release_lock_rejects_non_holder() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    store.create_ticket(sample_ticket("g1", Priority::P2, 1000)).unwrap();
    let ticket = store.get_tickets(&TicketFilter::default()).remove(0);

    store.acquire_lock(&ticket.id, "worker-1", 1000, 60_000).unwrap();
    let err = store.release_lock(&ticket.id, "worker-2").unwrap_err();
    assert!(matches!(err, TicketStoreError::NotLockHolder(_, _)));
}

#[test]
fn store_state_survives_reopen_via_wal_replay() {
    let dir = tempdir().unwrap();
    {
        let store = open_store(&dir);
        store.create_ticket(sample_ticket("g1", Priority::P1, 1000)).unwrap();
    }
    let store = open_store(&dir);
    assert_eq!(store.get_stats().total, 1);
}

#[test]
fn checkpoint_truncates_wal_but_preserves_index() {
    let dir = tempdir().unwrap();
    let store = open_store(&dir);
    for i in 0..5 {
        store
            .create_ticket(sample_ticket(&format!("g{i}"), Priority::P2, 1000 + i))
            .unwrap();
    }
    store.checkpoint().unwrap();
    assert_eq!(store.get_stats().total, 5);

    drop(store);
    let reopened = open_store(&dir);
    assert_eq!(reopened.get_stats().total, 5);
}
