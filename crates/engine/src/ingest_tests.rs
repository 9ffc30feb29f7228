// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use actifix_core::{FakeClock, SequentialIdGen};
use serial_test::serial;
use tempfile::tempdir;

fn harness(dir: &tempfile::TempDir, config: Config) -> IngestionPipeline<FakeClock, SequentialIdGen> {
    let ticket_store = Arc::new(
        TicketStore::open(&dir.path().join("tickets.wal"), &dir.path().join("tickets.snap")).unwrap(),
    );
    let event_log = Arc::new(EventLog::open(&dir.path().join("events.wal")).unwrap());
    let fallback_queue = Arc::new(
        FallbackQueue::open(&dir.path().join("fallback.json"), 1000, 86_400_000, 0).unwrap(),
    );
    let throttler = Arc::new(Throttler::open(&dir.path().join("throttle.wal"), &config, 0).unwrap());
    let clock = Arc::new(FakeClock::new(0));
    IngestionPipeline::new(
        ticket_store,
        event_log,
        fallback_queue,
        throttler,
        config,
        clock,
        SequentialIdGen::new("t"),
    )
}

#[test]
fn records_a_fresh_error_as_an_open_ticket() {
    let dir = tempdir().unwrap();
    let pipeline = harness(&dir, Config::default());
    let report = ErrorReport::new("boom", "mod/a.py:10");
    let ticket = pipeline.record_error(report).unwrap().unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(ticket.id.as_str().starts_with("ACT-"));
}

#[test]
fn duplicate_of_an_open_ticket_is_suppressed() {
    let dir = tempdir().unwrap();
    let pipeline = harness(&dir, Config::default());
    let first = pipeline.record_error(ErrorReport::new("boom", "mod/a.py:10")).unwrap();
    assert!(first.is_some());
    let second = pipeline.record_error(ErrorReport::new("boom", "mod/a.py:99")).unwrap();
    assert!(second.is_none());
}

#[test]
fn throttled_priority_returns_none_not_error() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.max_p2_tickets_per_hour = 1;
    let pipeline = harness(&dir, config);
    pipeline.record_error(ErrorReport::new("one", "mod/a.py:1")).unwrap().unwrap();
    let second = pipeline.record_error(ErrorReport::new("two", "mod/b.py:1")).unwrap();
    assert!(second.is_none());
}

#[test]
#[serial]
fn origin_gate_rejects_when_enforced_and_env_missing() {
    let dir = tempdir().unwrap();
    let mut config = Config::default();
    config.enforce_raise_af = true;
    let pipeline = harness(&dir, config);
    std::env::remove_var("ACTIFIX_CHANGE_ORIGIN");
    let result = pipeline.record_error(ErrorReport::new("boom", "mod/a.py:1"));
    assert!(matches!(result, Err(EngineError::OriginGateRejected)));
}

#[test]
fn duplicate_guard_ignores_line_numbers_and_absolute_paths() {
    let a = duplicate_guard("x", "failed at /home/user/app/mod.py:42", "ValueError", None);
    let b = duplicate_guard("x", "failed at /home/user/app/mod.py:99", "ValueError", None);
    assert_eq!(a, b);
}

#[test]
fn truncate_context_text_keeps_head_and_tail() {
    let text = "a".repeat(100);
    let truncated = truncate_context_text(&text, 40);
    assert!(truncated.contains("truncated"));
    assert!(truncated.len() < text.len());
}

#[test]
fn truncate_context_text_is_noop_under_limit() {
    assert_eq!(truncate_context_text("short", 100), "short");
}

#[test]
fn classify_priority_feeds_through_when_not_supplied() {
    let dir = tempdir().unwrap();
    let pipeline = harness(&dir, Config::default());
    let ticket = pipeline
        .record_error(ErrorReport::new("fatal crash", "mod/a.py:1"))
        .unwrap()
        .unwrap();
    assert_eq!(ticket.priority, Priority::P0);
}
