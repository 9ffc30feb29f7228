// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostics bundle export for support.
//!
//! Grounded on `original_source/src/actifix/diagnostics.py`: collects
//! system info, a sanitized config summary, ticket stats, recent
//! tickets, and health into one JSON document. The original zips this
//! together with a raw log tail into a `.zip`; this port instead
//! embeds the log tail as a string field and zstd-compresses the whole
//! document with `checkpoint.rs`'s compression idiom, since the crate
//! already depends on `zstd` and nothing in the example pack pulls in
//! a zip/tar crate.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use actifix_core::{Config, Paths, TicketFilter};
use actifix_storage::{TicketStats, TicketStore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::{get_health, HealthSnapshot};

const RECENT_TICKETS_LIMIT: usize = 50;
const RECENT_LOG_LINES: usize = 500;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize diagnostics bundle: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to compress diagnostics bundle: {0}")]
    Compress(std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub architecture: String,
    pub hostname: String,
    pub timestamp_ms: i64,
}

/// Non-sensitive config fields worth showing in a support bundle.
/// Anything that could be a credential (`ai_api_key`, webhook URLs
/// with embedded tokens) is deliberately left out rather than redacted
/// in place, mirroring the original's allowlist approach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub capture_enabled: bool,
    pub ai_enabled: bool,
    pub ai_provider: String,
    pub webhook_enabled: bool,
    pub completion_hooks_enabled: bool,
    pub enforce_raise_af: bool,
    pub cleanup_retention_days: u32,
}

impl ConfigSummary {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capture_enabled: config.capture_enabled,
            ai_enabled: config.ai_enabled,
            ai_provider: config.ai_provider.clone().unwrap_or_else(|| "default".to_string()),
            webhook_enabled: !config.webhook_urls.is_empty(),
            completion_hooks_enabled: !config.completion_hook_scripts.is_empty(),
            enforce_raise_af: config.enforce_raise_af,
            cleanup_retention_days: config.cleanup_retention_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentTicket {
    pub id: String,
    pub priority: String,
    pub error_type: String,
    pub source: String,
    pub status: String,
    pub created_at_ms: i64,
    pub message_preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsBundle {
    pub system_info: SystemInfo,
    pub config: ConfigSummary,
    pub ticket_stats: TicketStatsView,
    pub health_status: String,
    pub recent_tickets: Vec<RecentTicket>,
    pub recent_logs: Option<String>,
}

/// Flat view of `TicketStats` so the bundle's JSON keys read the same
/// as the original's plain dict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketStatsView {
    pub total: usize,
    pub locked: usize,
    pub by_status: HashMap<String, usize>,
    pub by_priority: HashMap<String, usize>,
}

impl From<&TicketStats> for TicketStatsView {
    fn from(stats: &TicketStats) -> Self {
        Self {
            total: stats.total,
            locked: stats.locked,
            by_status: stats.by_status.clone(),
            by_priority: stats.by_priority.clone(),
        }
    }
}

fn system_info(now_ms: i64) -> SystemInfo {
    SystemInfo {
        platform: std::env::consts::OS.to_string(),
        architecture: std::env::consts::ARCH.to_string(),
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string()),
        timestamp_ms: now_ms,
    }
}

fn recent_tickets(store: &TicketStore) -> Vec<RecentTicket> {
    let mut tickets = store.get_tickets(&TicketFilter {
        limit: Some(RECENT_TICKETS_LIMIT),
        ..Default::default()
    });
    tickets.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
    tickets
        .into_iter()
        .take(RECENT_TICKETS_LIMIT)
        .map(|t| RecentTicket {
            id: t.id.as_str().to_string(),
            priority: t.priority.as_str().to_string(),
            error_type: t.error_type,
            source: t.source,
            status: t.status.as_str().to_string(),
            created_at_ms: t.created_at_ms,
            message_preview: t.message.chars().take(200).collect(),
        })
        .collect()
}

fn tail_recent_logs(logs_dir: &Path, max_lines: usize) -> Option<String> {
    let mut log_files: Vec<PathBuf> = std::fs::read_dir(logs_dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("actifix") && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();

    log_files.sort_by_key(|p| std::fs::metadata(p).and_then(|m| m.modified()).ok());
    let latest = log_files.last()?;

    let content = std::fs::read_to_string(latest).ok()?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    Some(lines[start..].join("\n"))
}

/// Assemble a diagnostics bundle describing the current project state.
pub fn build_diagnostics_bundle(
    store: &TicketStore,
    stats: &TicketStats,
    paths: &Paths,
    config: &Config,
    include_logs: bool,
    include_tickets: bool,
    now_ms: i64,
) -> DiagnosticsBundle {
    let health: HealthSnapshot = get_health(store, stats, paths, config, None, now_ms);

    DiagnosticsBundle {
        system_info: system_info(now_ms),
        config: ConfigSummary::from_config(config),
        ticket_stats: TicketStatsView::from(stats),
        health_status: health.status.as_str().to_string(),
        recent_tickets: if include_tickets { recent_tickets(store) } else { Vec::new() },
        recent_logs: if include_logs {
            tail_recent_logs(&paths.logs_dir, RECENT_LOG_LINES)
        } else {
            None
        },
    }
}

/// Serialize `bundle` to JSON and zstd-compress it to `output_path`.
pub fn export_diagnostics_bundle(
    bundle: &DiagnosticsBundle,
    output_path: &Path,
) -> Result<(), DiagnosticsError> {
    let json = serde_json::to_vec_pretty(bundle)?;
    let compressed = zstd::encode_all(json.as_slice(), 3).map_err(DiagnosticsError::Compress)?;
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(output_path)?;
    file.write_all(&compressed)?;
    Ok(())
}

/// Default bundle filename, timestamped like the original's
/// `actifix_diagnostics_<UTC timestamp>.zip`.
pub fn default_bundle_path(paths: &Paths, timestamp_label: &str) -> PathBuf {
    paths.state_dir.join(format!("actifix_diagnostics_{timestamp_label}.json.zst"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actifix_core::{Config, Paths, PathOverrides};
    use tempfile::tempdir;

    fn test_paths(root: &Path) -> Paths {
        let overrides = PathOverrides {
            project_root: Some(root.to_path_buf()),
            data_dir: Some(root.join("data")),
            state_dir: Some(root.join("state")),
            logs_dir: Some(root.join("logs")),
        };
        let paths = Paths::resolve(&overrides).unwrap();
        paths.ensure_dirs().unwrap();
        paths
    }

    #[test]
    fn bundle_round_trips_through_compression() {
        let tmp = tempdir().unwrap();
        let paths = test_paths(tmp.path());
        let store = TicketStore::open(&paths.ticket_wal_path, &tmp.path().join("tickets.snap")).unwrap();
        let stats = store.get_stats();
        let config = Config::default();

        let bundle = build_diagnostics_bundle(&store, &stats, &paths, &config, false, true, 1_700_000_000_000);
        let out_path = default_bundle_path(&paths, "20260101_000000");
        export_diagnostics_bundle(&bundle, &out_path).unwrap();

        let compressed = std::fs::read(&out_path).unwrap();
        let decompressed = zstd::decode_all(compressed.as_slice()).unwrap();
        let round_tripped: DiagnosticsBundle = serde_json::from_slice(&decompressed).unwrap();
        assert_eq!(round_tripped.config.ai_enabled, config.ai_enabled);
        assert!(round_tripped.recent_tickets.is_empty());
    }
}
