// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct State {
    count: u32,
}

#[test]
fn test_snapshot_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let snapshot = Snapshot::new(1, 42, State { count: 3 });

    snapshot.save(&path).unwrap();
    assert!(path.exists());

    let loaded: Snapshot<State> = Snapshot::load(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 42);
    assert_eq!(loaded.state, State { count: 3 });
}

#[test]
fn test_load_nonexistent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nonexistent.json");

    let result: Option<Snapshot<State>> = Snapshot::load(&path).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_snapshot_atomic_write() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    let tmp_path = path.with_extension("tmp");

    let snapshot = Snapshot::new(1, 1, State::default());
    snapshot.save(&path).unwrap();

    assert!(!tmp_path.exists());
    assert!(path.exists());
}

#[test]
fn test_load_corrupt_snapshot_returns_none_and_creates_bak() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    // Write garbage data
    let mut f = File::create(&path).unwrap();
    f.write_all(b"\xe5\x03\x01binary-garbage").unwrap();
    drop(f);

    let result: Option<Snapshot<State>> = Snapshot::load(&path).unwrap();
    assert!(result.is_none());

    // Original file should be gone
    assert!(!path.exists());
    // .bak should exist with the corrupt content
    let bak = path.with_extension("bak");
    assert!(bak.exists());
}

#[test]
fn test_load_corrupt_snapshot_rotates_bak_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    // Simulate 4 corrupt loads — should keep at most 3 backups
    for i in 1..=4u8 {
        let mut f = File::create(&path).unwrap();
        f.write_all(&[i; 4]).unwrap();
        drop(f);

        let result: Option<Snapshot<State>> = Snapshot::load(&path).unwrap();
        assert!(result.is_none());
    }

    // .bak (most recent = round 4)
    let bak1 = path.with_extension("bak");
    assert!(bak1.exists());
    assert_eq!(fs::read(&bak1).unwrap(), vec![4u8; 4]);

    // .bak.2 (round 3)
    let bak2 = path.with_extension("bak.2");
    assert!(bak2.exists());
    assert_eq!(fs::read(&bak2).unwrap(), vec![3u8; 4]);

    // .bak.3 (round 2)
    let bak3 = path.with_extension("bak.3");
    assert!(bak3.exists());
    assert_eq!(fs::read(&bak3).unwrap(), vec![2u8; 4]);

    // Round 1 was evicted
    let bak4 = path.with_extension("bak.4");
    assert!(!bak4.exists());
}
