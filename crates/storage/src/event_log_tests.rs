// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use actifix_core::EventLevel;
use tempfile::tempdir;

#[test]
fn record_assigns_increasing_ids() {
    let dir = tempdir().unwrap();
    let log = EventLog::open(&dir.path().join("events.wal")).unwrap();

    let id1 = log.record(Event::new("TICKET_CREATED", EventLevel::Info, "first")).unwrap();
    let id2 = log.record(Event::new("TICKET_CREATED", EventLevel::Info, "second")).unwrap();
    assert!(id2 > id1);
    assert_eq!(log.len(), 2);
}

#[test]
fn query_filters_by_event_type_and_level() {
    let dir = tempdir().unwrap();
    let log = EventLog::open(&dir.path().join("events.wal")).unwrap();

    log.record(Event::new("WEBHOOK_SUCCESS", EventLevel::Info, "ok")).unwrap();
    log.record(Event::new("WEBHOOK_HTTP_ERROR", EventLevel::Error, "bad")).unwrap();

    let errors = log.query(&EventFilter {
        level: Some(EventLevel::Error),
        ..Default::default()
    });
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].event_type, "WEBHOOK_HTTP_ERROR");
}

#[test]
fn query_returns_newest_first() {
    let dir = tempdir().unwrap();
    let log = EventLog::open(&dir.path().join("events.wal")).unwrap();
    log.record(Event::new("A", EventLevel::Info, "1")).unwrap();
    log.record(Event::new("B", EventLevel::Info, "2")).unwrap();

    let all = log.query(&EventFilter::default());
    assert_eq!(all[0].event_type, "B");
    assert_eq!(all[1].event_type, "A");
}

#[test]
fn events_survive_reopen_via_wal_replay() {
    let dir = tempdir().unwrap();
    {
        let log = EventLog::open(&dir.path().join("events.wal")).unwrap();
        log.record(Event::new("A", EventLevel::Info, "1")).unwrap();
    }
    let log = EventLog::open(&dir.path().join("events.wal")).unwrap();
    assert_eq!(log.len(), 1);
}
