// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C12: health and metrics.
//!
//! `get_health()` produces a point-in-time snapshot; `render_prometheus`
//! turns it into the text-exposition format a scraper expects.
//!
//! Grounded stylistically on `monitor.rs`'s periodic-check idiom
//! (threshold constants, structured status enum) and `usage_metrics.rs`'s
//! accounting style; the health-check semantics themselves are from
//! spec.md §4.12.

use actifix_core::{Config, Paths, Priority, TicketStatus};
use actifix_storage::{TicketStats, TicketStore};
use std::collections::HashMap;
use std::path::Path;

const DISK_WARN_PCT: f64 = 90.0;
const DISK_CRITICAL_PCT: f64 = 95.0;
const DB_GROWTH_WARN_BYTES: u64 = 100 * 1024 * 1024;
const DB_GROWTH_CRITICAL_BYTES: u64 = 500 * 1024 * 1024;
const HEARTBEAT_STALE_MS: i64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Critical,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warning => "warning",
            Status::Critical => "critical",
        }
    }

    fn worse(self, other: Status) -> Status {
        use Status::*;
        match (self, other) {
            (Critical, _) | (_, Critical) => Critical,
            (Warning, _) | (_, Warning) => Warning,
            _ => Ok,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiskUsage {
    pub path: std::path::PathBuf,
    pub used_pct: f64,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub generated_at_ms: i64,
    pub open: usize,
    pub completed: usize,
    pub locked: usize,
    pub by_priority: HashMap<String, usize>,
    pub sla_breaches: Vec<String>,
    pub disk_usage: Vec<DiskUsage>,
    pub db_growth_status: Status,
    pub db_size_bytes: u64,
    pub missing_artifacts: Vec<String>,
    pub heartbeat_stale: Option<bool>,
    pub status: Status,
}

/// Run the full C12 health check against `store`'s current stats and
/// the paths bundle's on-disk artifacts.
pub fn get_health(
    store: &TicketStore,
    stats: &TicketStats,
    paths: &Paths,
    config: &Config,
    agent_heartbeat_ms: Option<i64>,
    now_ms: i64,
) -> HealthSnapshot {
    let open = *stats.by_status.get(TicketStatus::Open.as_str()).unwrap_or(&0);
    let completed = *stats.by_status.get(TicketStatus::Completed.as_str()).unwrap_or(&0);

    let sla_breaches = store
        .get_tickets(&actifix_core::TicketFilter {
            status: Some(TicketStatus::Open),
            ..Default::default()
        })
        .into_iter()
        .filter_map(|t| {
            let sla_hours = config.sla_hours(t.priority)?;
            let elapsed = t.sla_hours_elapsed(now_ms);
            (elapsed > sla_hours as f64).then(|| t.id.as_str().to_string())
        })
        .collect::<Vec<_>>();

    let disk_usage = vec![
        disk_usage_for(&paths.state_dir),
        disk_usage_for(&paths.data_dir),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    let db_size_bytes = file_size(&paths.ticket_wal_path);
    let db_growth_status = if db_size_bytes >= DB_GROWTH_CRITICAL_BYTES {
        Status::Critical
    } else if db_size_bytes >= DB_GROWTH_WARN_BYTES {
        Status::Warning
    } else {
        Status::Ok
    };

    let missing_artifacts = paths
        .core_artifacts()
        .into_iter()
        .filter(|p| !artifact_is_writable(p))
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>();

    let heartbeat_stale = agent_heartbeat_ms.map(|hb| now_ms - hb > HEARTBEAT_STALE_MS);

    let mut status = Status::Ok;
    if !sla_breaches.is_empty() {
        status = status.worse(Status::Warning);
    }
    if !missing_artifacts.is_empty() {
        status = status.worse(Status::Critical);
    }
    status = status.worse(db_growth_status);
    for d in &disk_usage {
        status = status.worse(d.status);
    }
    if heartbeat_stale == Some(true) {
        status = status.worse(Status::Warning);
    }

    HealthSnapshot {
        generated_at_ms: now_ms,
        open,
        completed,
        locked: stats.locked,
        by_priority: stats.by_priority.clone(),
        sla_breaches,
        disk_usage,
        db_growth_status,
        db_size_bytes,
        missing_artifacts,
        heartbeat_stale,
        status,
    }
}

fn disk_usage_for(dir: &Path) -> Option<DiskUsage> {
    let total = fs2::total_space(dir).ok()?;
    let available = fs2::available_space(dir).ok()?;
    if total == 0 {
        return None;
    }
    let used_pct = 100.0 * (1.0 - (available as f64 / total as f64));
    let status = if used_pct >= DISK_CRITICAL_PCT {
        Status::Critical
    } else if used_pct >= DISK_WARN_PCT {
        Status::Warning
    } else {
        Status::Ok
    };
    Some(DiskUsage {
        path: dir.to_path_buf(),
        used_pct,
        status,
    })
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

fn artifact_is_writable(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    parent.exists() && std::fs::metadata(parent).map(|m| !m.permissions().readonly()).unwrap_or(false)
}

/// Render the Prometheus text-exposition format described in spec.md
/// §4.12: `actifix_info`, per-status/per-priority ticket gauges, overall
/// health status, and a generation timestamp.
pub fn render_prometheus(snapshot: &HealthSnapshot) -> String {
    let mut out = String::new();
    out.push_str("# HELP actifix_info Static build/version info.\n");
    out.push_str("# TYPE actifix_info gauge\n");
    out.push_str("actifix_info{version=\"1\"} 1\n");

    out.push_str("# TYPE actifix_tickets_total gauge\n");
    out.push_str(&format!(
        "actifix_tickets_total {}\n",
        snapshot.open + snapshot.completed
    ));
    out.push_str("# TYPE actifix_tickets_open gauge\n");
    out.push_str(&format!("actifix_tickets_open {}\n", snapshot.open));
    out.push_str("# TYPE actifix_tickets_completed gauge\n");
    out.push_str(&format!("actifix_tickets_completed {}\n", snapshot.completed));

    out.push_str("# TYPE actifix_tickets_by_priority gauge\n");
    for p in Priority::ALL {
        let count = snapshot.by_priority.get(p.as_str()).copied().unwrap_or(0);
        out.push_str(&format!(
            "actifix_tickets_by_priority{{priority=\"{}\"}} {}\n",
            p.as_str(),
            count
        ));
    }

    out.push_str("# TYPE actifix_health_status gauge\n");
    out.push_str(&format!(
        "actifix_health_status{{status=\"{}\"}} 1\n",
        snapshot.status.as_str()
    ));

    out.push_str("# TYPE actifix_health_generated_at_ms gauge\n");
    out.push_str(&format!(
        "actifix_health_generated_at_ms {}\n",
        snapshot.generated_at_ms
    ));

    out
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
