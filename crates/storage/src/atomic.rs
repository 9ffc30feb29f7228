// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file writes: temp file in the same directory, flush, fsync,
//! rename, best-effort directory fsync. Used for the full-rewrite
//! artifacts (`ACTIFIX-LIST.md`, `ACTIFIX.md`, the fallback queue file)
//! that aren't WAL-backed.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `contents` to `path` atomically: write to a sibling temp file,
/// fsync, rename over the destination, then best-effort fsync the
/// containing directory.
pub fn atomic_write(path: &Path, contents: &str) -> Result<(), AtomicWriteError> {
    atomic_write_bytes(path, contents.as_bytes())
}

pub fn atomic_write_bytes(path: &Path, contents: &[u8]) -> Result<(), AtomicWriteError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let result = (|| -> Result<(), AtomicWriteError> {
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(contents)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        // Best-effort directory fsync; not all platforms support opening
        // a directory for this, so failures here are swallowed.
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}
