// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    n: u32,
}

#[test]
fn append_and_flush_then_reopen_replays_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
        wal.append(&Sample { n: 1 }).unwrap();
        wal.append(&Sample { n: 2 }).unwrap();
        wal.flush().unwrap();
    }

    let wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, Sample { n: 1 });
    assert_eq!(entries[1].seq, 2);
}

#[test]
fn next_unprocessed_advances_past_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
    wal.append(&Sample { n: 1 }).unwrap();
    wal.append(&Sample { n: 2 }).unwrap();
    wal.flush().unwrap();

    let first = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(first.event, Sample { n: 1 });
    wal.mark_processed(first.seq);

    let second = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(second.event, Sample { n: 2 });

    assert!(wal.next_unprocessed().unwrap().is_none());
}

#[test]
fn truncate_before_drops_old_entries_but_keeps_unprocessed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    let mut wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
    for n in 1..=5u32 {
        wal.append(&Sample { n }).unwrap();
    }
    wal.flush().unwrap();
    wal.mark_processed(3);
    wal.truncate_before(4).unwrap();

    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, Sample { n: 4 });
}

#[test]
fn corrupt_tail_is_rotated_to_bak_and_valid_prefix_survives() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.wal");

    {
        let mut wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
        wal.append(&Sample { n: 1 }).unwrap();
        wal.flush().unwrap();
    }

    use std::io::Write;
    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(b"{not valid json\n").unwrap();

    let wal: Wal<Sample> = Wal::open(&path, 0).unwrap();
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(path.with_extension("bak").exists());
}
