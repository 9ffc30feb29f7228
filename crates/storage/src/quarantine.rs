// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quarantine: markdown notes for tickets flagged un-fixable after
//! repeated failed dispatches, written under `state_dir/quarantine/`.
//! Corruption is quarantined, not fatal, so the rest of the system
//! keeps running.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::atomic::{atomic_write, AtomicWriteError};

fn to_iso8601(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339()
}

fn from_iso8601(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.timestamp_millis())
}

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("atomic write failed: {0}")]
    Write(#[from] AtomicWriteError),
}

/// A quarantined item, parsed back from its markdown note.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarantineEntry {
    pub entry_id: String,
    pub original_source: String,
    pub reason: String,
    pub quarantined_at_ms: i64,
    pub file_path: PathBuf,
}

/// Write a quarantine note for `source` (typically a ticket id),
/// naming `reason` for why it could not be resolved automatically.
pub fn quarantine_content(
    quarantine_dir: &Path,
    entry_id: &str,
    source: &str,
    reason: &str,
    content: &str,
    now_ms: i64,
) -> Result<QuarantineEntry, QuarantineError> {
    fs::create_dir_all(quarantine_dir)?;

    let file_path = quarantine_dir.join(format!("{entry_id}.md"));
    let quarantined_at = to_iso8601(now_ms);
    let note = format!(
        "# Quarantined Content\n\n\
- **Entry ID**: {entry_id}\n\
- **Source**: {source}\n\
- **Reason**: {reason}\n\
- **Quarantined At**: {quarantined_at}\n\n\
## Original Content\n\n\
```\n{content}\n```\n\n\
## Recovery Notes\n\n\
To recover this content:\n\
1. Review the content above\n\
2. Fix any issues\n\
3. Manually reintegrate if needed\n\
4. Delete this file when resolved\n"
    );
    atomic_write(&file_path, &note)?;

    Ok(QuarantineEntry {
        entry_id: entry_id.to_string(),
        original_source: source.to_string(),
        reason: reason.to_string(),
        quarantined_at_ms: now_ms,
        file_path,
    })
}

/// List every quarantined item, newest first.
pub fn list_quarantine(quarantine_dir: &Path) -> Result<Vec<QuarantineEntry>, QuarantineError> {
    if !quarantine_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for dir_entry in fs::read_dir(quarantine_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".md") {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        entries.push(parse_entry(&path, &content));
    }

    entries.sort_by(|a, b| b.quarantined_at_ms.cmp(&a.quarantined_at_ms));
    Ok(entries)
}

pub fn get_quarantine_count(quarantine_dir: &Path) -> usize {
    list_quarantine(quarantine_dir).map(|v| v.len()).unwrap_or(0)
}

fn parse_entry(path: &Path, content: &str) -> QuarantineEntry {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut entry_id = stem;
    let mut source = String::new();
    let mut reason = String::new();
    let mut quarantined_at_ms = 0i64;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("- **Entry ID**:") {
            entry_id = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("- **Source**:") {
            source = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("- **Reason**:") {
            reason = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("- **Quarantined At**:") {
            quarantined_at_ms = from_iso8601(rest.trim()).unwrap_or(0);
        }
    }

    QuarantineEntry {
        entry_id,
        original_source: source,
        reason,
        quarantined_at_ms,
        file_path: path.to_path_buf(),
    }
}
