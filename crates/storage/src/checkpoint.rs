// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background checkpointing with zstd compression and durable fsync.
//!
//! The checkpointer runs I/O off the main thread while preserving the
//! durability invariant: a snapshot (including directory fsync) must be
//! durable before the WAL it summarizes is truncated.
//!
//! ```text
//! Main Thread                    Background Thread
//! ───────────────────────────    ─────────────────────────────
//! clone state
//!   │
//!   └─────────────────────────→  serialize + compress
//!                                write to .tmp, fsync
//!                                rename → snapshot, fsync dir
//!   ←────────────────────────────┘ (completion signal)
//! truncate WAL (safe now)
//! ```
//!
//! The `CheckpointWriter` trait abstracts all I/O, enabling deterministic
//! tests with a fake writer and error injection for crash scenarios.

use crate::migration::MigrationRegistry;
use crate::{Snapshot, SnapshotError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("checkpoint in progress")]
    InProgress,
    #[error("checkpoint failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CheckpointResult {
    pub seq: u64,
    pub size_bytes: u64,
}

pub trait CheckpointWriter: Send + Sync + 'static {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError>;
    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError>;
    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError>;
    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError>;
    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError>;
}

#[derive(Clone)]
pub struct FsCheckpointWriter;

impl CheckpointWriter for FsCheckpointWriter {
    fn write_tmp(&self, path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(data)?;
        Ok(())
    }

    fn fsync_file(&self, path: &Path) -> Result<(), CheckpointError> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), CheckpointError> {
        std::fs::rename(from, to)?;
        Ok(())
    }

    fn fsync_dir(&self, path: &Path) -> Result<(), CheckpointError> {
        File::open(path)?.sync_all()?;
        Ok(())
    }

    fn file_size(&self, path: &Path) -> Result<u64, CheckpointError> {
        Ok(std::fs::metadata(path)?.len())
    }
}

pub struct CheckpointHandle {
    pub seq: u64,
    receiver: mpsc::Receiver<Result<CheckpointResult, CheckpointError>>,
    #[allow(dead_code)]
    handle: JoinHandle<()>,
}

impl CheckpointHandle {
    pub fn wait(self) -> Result<CheckpointResult, CheckpointError> {
        self.receiver
            .recv()
            .map_err(|_| CheckpointError::Failed("checkpoint thread panicked".into()))?
    }

    pub fn try_wait(&self) -> Option<Result<CheckpointResult, CheckpointError>> {
        self.receiver.try_recv().ok()
    }
}

/// Manages background snapshot operations for materialized state `S`.
pub struct Checkpointer<S, W: CheckpointWriter = FsCheckpointWriter> {
    writer: W,
    snapshot_path: PathBuf,
    compression_level: i32,
    version: u32,
    _marker: std::marker::PhantomData<S>,
}

impl<S> Checkpointer<S, FsCheckpointWriter> {
    pub fn new(snapshot_path: PathBuf, version: u32) -> Self {
        Self::with_writer(FsCheckpointWriter, snapshot_path, version)
    }
}

impl<S, W: CheckpointWriter + Clone> Checkpointer<S, W>
where
    S: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    pub fn with_writer(writer: W, snapshot_path: PathBuf, version: u32) -> Self {
        Self {
            writer,
            snapshot_path,
            compression_level: 3,
            version,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Start a background checkpoint. The returned handle must be waited
    /// on before truncating the WAL it summarizes.
    pub fn start(&self, seq: u64, state: &S) -> CheckpointHandle {
        let state_clone = state.clone();
        let writer = self.writer.clone();
        let snapshot_path = self.snapshot_path.clone();
        let compression_level = self.compression_level;
        let version = self.version;

        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let result = checkpoint_blocking(
                &writer,
                version,
                seq,
                &state_clone,
                &snapshot_path,
                compression_level,
            );
            let _ = tx.send(result);
        });

        CheckpointHandle {
            seq,
            receiver: rx,
            handle,
        }
    }

    /// Perform a synchronous checkpoint (e.g. on shutdown).
    pub fn checkpoint_sync(&self, seq: u64, state: &S) -> Result<CheckpointResult, CheckpointError> {
        checkpoint_blocking(
            &self.writer,
            self.version,
            seq,
            state,
            &self.snapshot_path,
            self.compression_level,
        )
    }
}

fn checkpoint_blocking<S: Serialize + Clone, W: CheckpointWriter>(
    writer: &W,
    version: u32,
    seq: u64,
    state: &S,
    snapshot_path: &Path,
    compression_level: i32,
) -> Result<CheckpointResult, CheckpointError> {
    let tmp_path = snapshot_path.with_extension("tmp");

    let snapshot = Snapshot {
        version,
        seq,
        state: state.clone(),
        created_at: Utc::now(),
    };

    let json_bytes = serde_json::to_vec(&snapshot)?;

    let compressed = zstd::encode_all(json_bytes.as_slice(), compression_level)
        .map_err(|e| CheckpointError::Compress(e.to_string()))?;

    writer.write_tmp(&tmp_path, &compressed)?;
    writer.fsync_file(&tmp_path)?;
    writer.rename(&tmp_path, snapshot_path)?;

    if let Some(parent) = snapshot_path.parent() {
        writer.fsync_dir(parent)?;
    }

    let size_bytes = writer
        .file_size(snapshot_path)
        .unwrap_or(compressed.len() as u64);

    Ok(CheckpointResult { seq, size_bytes })
}

/// Load a zstd-compressed, migration-aware snapshot.
pub fn load_snapshot<S>(path: &Path, current_version: u32) -> Result<Option<Snapshot<S>>, SnapshotError>
where
    S: Serialize + DeserializeOwned + Clone,
{
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let decoder = zstd::stream::read::Decoder::new(file)
        .map_err(|e| SnapshotError::Io(std::io::Error::other(e.to_string())))?;
    let value: Value = serde_json::from_reader(decoder)?;

    let registry = MigrationRegistry::new();
    let migrated = registry
        .migrate_to(value, current_version)
        .map_err(|e| SnapshotError::Io(std::io::Error::other(e.to_string())))?;
    let snapshot: Snapshot<S> = serde_json::from_value(migrated)?;
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
