// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct FakeState {
    rows: Vec<u32>,
}

fn state_with(n: usize) -> FakeState {
    FakeState {
        rows: (0..n as u32).collect(),
    }
}

#[derive(Debug, Clone, Default)]
struct IoLog {
    writes: Vec<(PathBuf, usize)>,
    fsyncs_file: Vec<PathBuf>,
    fsyncs_dir: Vec<PathBuf>,
    renames: Vec<(PathBuf, PathBuf)>,
}

#[derive(Clone)]
struct FakeCheckpointWriter {
    log: Arc<Mutex<IoLog>>,
    written_data: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    fail_write: Arc<AtomicBool>,
    fail_fsync_file: Arc<AtomicBool>,
    fail_fsync_dir: Arc<AtomicBool>,
    fsync_file_count: Arc<AtomicU32>,
    fsync_dir_count: Arc<AtomicU32>,
}

impl FakeCheckpointWriter {
    fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(IoLog::default())),
            written_data: Arc::new(Mutex::new(HashMap::new())),
            fail_write: Arc::new(AtomicBool::new(false)),
            fail_fsync_file: Arc::new(AtomicBool::new(false)),
            fail_fsync_dir: Arc::new(AtomicBool::new(false)),
            fsync_file_count: Arc::new(AtomicU32::new(0)),
            fsync_dir_count: Arc::new(AtomicU32::new(0)),
        }
    }

    fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }
    fn set_fail_fsync_file(&self, fail: bool) {
        self.fail_fsync_file.store(fail, Ordering::SeqCst);
    }
    fn set_fail_fsync_dir(&self, fail: bool) {
        self.fail_fsync_dir.store(fail, Ordering::SeqCst);
    }
    fn log(&self) -> IoLog {
        self.log.lock().unwrap().clone()
    }
    fn fsync_file_count(&self) -> u32 {
        self.fsync_file_count.load(Ordering::SeqCst)
    }
    fn fsync_dir_count(&self) -> u32 {
        self.fsync_dir_count.load(Ordering::SeqCst)
    }
    fn get_written_data(&self, path: &Path) -> Option<Vec<u8>> {
        self.written_data.lock().unwrap().get(path).cloned()
    }
}

impl CheckpointWriter for FakeCheckpointWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io(std::io::Error::other("injected write failure")));
        }
        self.log.lock().unwrap().writes.push((path.to_owned(), data.len()));
        self.written_data.lock().unwrap().insert(path.to_owned(), data.to_vec());
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError> {
        if self.fail_fsync_file.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io(std::io::Error::other("injected fsync failure")));
        }
        self.fsync_file_count.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().fsyncs_file.push(path.to_owned());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError> {
        let data = self.written_data.lock().unwrap().remove(from);
        if let Some(d) = data {
            self.written_data.lock().unwrap().insert(to.to_owned(), d);
        }
        self.log.lock().unwrap().renames.push((from.to_owned(), to.to_owned()));
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError> {
        if self.fail_fsync_dir.load(Ordering::SeqCst) {
            return Err(CheckpointError::Io(std::io::Error::other("injected fsync_dir failure")));
        }
        self.fsync_dir_count.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().fsyncs_dir.push(path.to_owned());
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError> {
        let data = self.written_data.lock().unwrap();
        Ok(data.get(path).map(|d| d.len() as u64).unwrap_or(0))
    }
}

#[test]
fn checkpoint_basic_flow_writes_fsyncs_and_renames_in_order() {
    let writer = FakeCheckpointWriter::new();
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer.clone(), PathBuf::from("/data/snapshot.json"), VERSION);

    let state = state_with(3);
    let handle = checkpointer.start(42, &state);
    let result = handle.wait().unwrap();

    assert_eq!(result.seq, 42);
    assert!(result.size_bytes > 0);

    let log = writer.log();
    assert_eq!(log.writes.len(), 1);
    assert_eq!(log.fsyncs_file.len(), 1);
    assert_eq!(log.renames.len(), 1);
    assert_eq!(log.fsyncs_dir.len(), 1);
    assert!(log.writes[0].0.to_string_lossy().contains(".tmp"));
    assert_eq!(log.renames[0].1, PathBuf::from("/data/snapshot.json"));
    assert_eq!(log.fsyncs_dir[0], PathBuf::from("/data"));
}

#[test]
fn dir_fsync_happens_after_rename_for_wal_truncation_safety() {
    let writer = FakeCheckpointWriter::new();
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer.clone(), PathBuf::from("/data/snapshot.json"), VERSION);

    let state = state_with(1);
    checkpointer.start(100, &state).wait().unwrap();

    assert_eq!(writer.fsync_file_count(), 1);
    assert_eq!(writer.fsync_dir_count(), 1);
}

#[test]
fn output_is_zstd_compressed_and_round_trips() {
    let writer = FakeCheckpointWriter::new();
    let snapshot_path = PathBuf::from("/data/snapshot.json");
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer.clone(), snapshot_path.clone(), VERSION);

    let state = state_with(10);
    checkpointer.start(1, &state).wait().unwrap();

    let data = writer.get_written_data(&snapshot_path).unwrap();
    assert_eq!(&data[0..4], &[0x28, 0xB5, 0x2F, 0xFD]);

    let decompressed = zstd::decode_all(data.as_slice()).unwrap();
    let snapshot: Snapshot<FakeState> = serde_json::from_slice(&decompressed).unwrap();
    assert_eq!(snapshot.seq, 1);
    assert_eq!(snapshot.state.rows.len(), 10);
}

#[test]
fn write_failure_propagates() {
    let writer = FakeCheckpointWriter::new();
    writer.set_fail_write(true);
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer, PathBuf::from("/data/snapshot.json"), VERSION);

    let result = checkpointer.start(1, &state_with(1)).wait();
    assert!(matches!(result.unwrap_err(), CheckpointError::Io(_)));
}

#[test]
fn fsync_file_failure_propagates() {
    let writer = FakeCheckpointWriter::new();
    writer.set_fail_fsync_file(true);
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer, PathBuf::from("/data/snapshot.json"), VERSION);

    assert!(checkpointer.start(1, &state_with(1)).wait().is_err());
}

#[test]
fn dir_fsync_failure_propagates() {
    let writer = FakeCheckpointWriter::new();
    writer.set_fail_fsync_dir(true);
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer, PathBuf::from("/data/snapshot.json"), VERSION);

    assert!(checkpointer.start(1, &state_with(1)).wait().is_err());
}

#[test]
fn checkpoint_sync_blocks_until_durable() {
    let writer = FakeCheckpointWriter::new();
    let checkpointer: Checkpointer<FakeState, _> =
        Checkpointer::with_writer(writer.clone(), PathBuf::from("/data/snapshot.json"), VERSION);

    let result = checkpointer.checkpoint_sync(99, &state_with(5)).unwrap();

    assert_eq!(result.seq, 99);
    assert_eq!(writer.fsync_file_count(), 1);
    assert_eq!(writer.fsync_dir_count(), 1);
}

#[test]
fn load_snapshot_round_trips_through_real_filesystem() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let checkpointer: Checkpointer<FakeState> = Checkpointer::new(path.clone(), VERSION);
    checkpointer.checkpoint_sync(42, &state_with(3)).unwrap();

    let loaded: Snapshot<FakeState> = load_snapshot(&path, VERSION).unwrap().unwrap();
    assert_eq!(loaded.seq, 42);
    assert_eq!(loaded.state.rows.len(), 3);
}

#[test]
fn load_snapshot_nonexistent_returns_none() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nonexistent.json");
    let result: Option<Snapshot<FakeState>> = load_snapshot(&path, VERSION).unwrap();
    assert!(result.is_none());
}

#[test]
fn compression_shrinks_larger_states() {
    let dir = tempdir().unwrap();
    let compressed_path = dir.path().join("compressed.json");
    let uncompressed_path = dir.path().join("uncompressed.json");

    let state = state_with(500);

    let checkpointer: Checkpointer<FakeState> = Checkpointer::new(compressed_path.clone(), VERSION);
    let result = checkpointer.checkpoint_sync(1, &state).unwrap();

    let snapshot = Snapshot::new(VERSION, 1, state);
    snapshot.save(&uncompressed_path).unwrap();
    let uncompressed_size = std::fs::metadata(&uncompressed_path).unwrap().len();

    assert!(result.size_bytes < uncompressed_size / 2);
}
