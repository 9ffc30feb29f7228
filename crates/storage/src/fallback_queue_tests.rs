// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::collections::HashMap;
use tempfile::tempdir;

fn open(dir: &tempfile::TempDir) -> FallbackQueue {
    FallbackQueue::open(&dir.path().join("fallback.json"), 1000, 86_400_000, 0).unwrap()
}

#[test]
fn enqueue_same_operation_and_key_updates_in_place() {
    let dir = tempdir().unwrap();
    let q = open(&dir);

    q.enqueue(
        "QE-1".to_string(),
        FallbackOperation::Write,
        "ticket/ACT-1",
        json!({"a": 1}),
        1000,
        HashMap::new(),
    )
    .unwrap();
    q.enqueue(
        "QE-2".to_string(),
        FallbackOperation::Write,
        "ticket/ACT-1",
        json!({"a": 2}),
        2000,
        HashMap::new(),
    )
    .unwrap();

    assert_eq!(q.len(), 1);
    let entry = q.peek(1).remove(0);
    assert_eq!(entry.content, json!({"a": 2}));
}

#[test]
fn enqueue_past_capacity_drops_oldest() {
    let dir = tempdir().unwrap();
    let q = FallbackQueue::open(&dir.path().join("fallback.json"), 2, 86_400_000, 0).unwrap();

    q.enqueue("1".into(), FallbackOperation::Write, "a", json!(1), 1000, HashMap::new()).unwrap();
    q.enqueue("2".into(), FallbackOperation::Write, "b", json!(2), 2000, HashMap::new()).unwrap();
    q.enqueue("3".into(), FallbackOperation::Write, "c", json!(3), 3000, HashMap::new()).unwrap();

    assert_eq!(q.len(), 2);
    let remaining: Vec<_> = q.peek(2).into_iter().map(|e| e.key).collect();
    assert_eq!(remaining, vec!["b".to_string(), "c".to_string()]);
}

#[test]
fn dequeue_removes_and_returns_entry() {
    let dir = tempdir().unwrap();
    let q = open(&dir);
    q.enqueue("QE-1".into(), FallbackOperation::Delete, "k", json!(null), 1000, HashMap::new()).unwrap();

    let removed = q.dequeue("QE-1").unwrap().unwrap();
    assert_eq!(removed.key, "k");
    assert!(q.is_empty());
    assert!(q.dequeue("QE-1").unwrap().is_none());
}

#[test]
fn replay_drops_succeeded_and_exhausted_entries_keeps_failed() {
    let dir = tempdir().unwrap();
    let q = open(&dir);
    q.enqueue("ok".into(), FallbackOperation::Write, "ok-key", json!(1), 1000, HashMap::new()).unwrap();
    q.enqueue("bad".into(), FallbackOperation::Write, "bad-key", json!(2), 1000, HashMap::new()).unwrap();

    let stats = q
        .replay(|entry| entry.key == "ok-key", 3, 2000)
        .unwrap();

    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(q.len(), 1);
    let remaining = q.peek(1).remove(0);
    assert_eq!(remaining.key, "bad-key");
    assert_eq!(remaining.retry_count, 1);
}

#[test]
fn replay_skips_entries_past_max_retries() {
    let dir = tempdir().unwrap();
    let q = open(&dir);
    q.enqueue("e".into(), FallbackOperation::Write, "k", json!(1), 1000, HashMap::new()).unwrap();
    // exhaust retries
    q.replay(|_| false, 1, 1000).unwrap();
    let stats = q.replay(|_| false, 1, 2000).unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(q.len(), 1);
}

#[test]
fn prune_drops_entries_older_than_max_age() {
    let dir = tempdir().unwrap();
    let q = FallbackQueue::open(&dir.path().join("fallback.json"), 1000, 1_000, 0).unwrap();
    q.enqueue("e".into(), FallbackOperation::Write, "k", json!(1), 0, HashMap::new()).unwrap();

    let pruned = q.prune(5_000).unwrap();
    assert_eq!(pruned, 1);
    assert!(q.is_empty());
}

#[test]
fn queue_survives_reopen_via_atomic_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fallback.json");
    {
        let q = FallbackQueue::open(&path, 1000, 86_400_000, 0).unwrap();
        q.enqueue("e".into(), FallbackOperation::Append, "k", json!({"x": 1}), 1000, HashMap::new()).unwrap();
    }
    let q = FallbackQueue::open(&path, 1000, 86_400_000, 2000).unwrap();
    assert_eq!(q.len(), 1);
}

#[test]
fn clear_empties_queue_and_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fallback.json");
    let q = FallbackQueue::open(&path, 1000, 86_400_000, 0).unwrap();
    q.enqueue("e".into(), FallbackOperation::Write, "k", json!(1), 1000, HashMap::new()).unwrap();
    assert_eq!(q.clear().unwrap(), 1);

    let reopened = FallbackQueue::open(&path, 1000, 86_400_000, 2000).unwrap();
    assert!(reopened.is_empty());
}
