// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C1: path resolution.
//!
//! Resolves, in precedence order: explicit overrides -> environment
//! (`ACTIFIX_*`) -> defaults derived from the current working
//! directory. Mirrors the original `state_paths.py`'s single source of
//! truth for every on-disk artifact, generalized to the durable-store
//! layout this port uses (§8's Open Question: one canonical state path,
//! no legacy base-dir coexistence going forward — see `migrate_legacy`).

use std::env;
use std::path::{Path, PathBuf};

/// Resolved location of every Actifix on-disk artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub quarantine_dir: PathBuf,

    pub ticket_wal_path: PathBuf,
    pub event_wal_path: PathBuf,
    pub throttle_ledger_path: PathBuf,
    pub rate_limit_ledger_path: PathBuf,
    pub fallback_queue_path: PathBuf,
    pub list_file: PathBuf,
    pub rollup_file: PathBuf,
    pub app_state_path: PathBuf,
    pub module_status_path: PathBuf,

    /// Legacy (pre-consolidation) fallback queue location in the base
    /// dir, checked once at startup for a one-time migration.
    pub legacy_fallback_queue_path: PathBuf,
}

/// Overrides honored before falling back to environment/defaults.
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub project_root: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
}

fn env_path(var: &str) -> Option<PathBuf> {
    env::var(var).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

impl Paths {
    /// Resolve paths using explicit overrides, then `ACTIFIX_*`
    /// environment variables, then CWD-derived defaults.
    pub fn resolve(overrides: &PathOverrides) -> std::io::Result<Self> {
        let cwd = env::current_dir()?;
        let project_root = overrides
            .project_root
            .clone()
            .or_else(|| env_path("ACTIFIX_PROJECT_ROOT"))
            .unwrap_or(cwd);
        let project_root = dunce_canonicalize(&project_root);

        let data_dir = overrides
            .data_dir
            .clone()
            .or_else(|| env_path("ACTIFIX_DATA_DIR"))
            .unwrap_or_else(|| project_root.join("actifix"));

        let state_dir = overrides
            .state_dir
            .clone()
            .or_else(|| env_path("ACTIFIX_STATE_DIR"))
            .unwrap_or_else(|| project_root.join(".actifix"));

        let logs_dir = overrides
            .logs_dir
            .clone()
            .or_else(|| env_path("ACTIFIX_LOGS_DIR"))
            .unwrap_or_else(|| project_root.join("logs"));

        let quarantine_dir = state_dir.join("quarantine");

        Ok(Self {
            ticket_wal_path: data_dir.join("tickets.wal"),
            event_wal_path: data_dir.join("events.wal"),
            throttle_ledger_path: state_dir.join("ticket_throttle.wal"),
            rate_limit_ledger_path: state_dir.join("rate_limits.wal"),
            fallback_queue_path: state_dir.join("actifix_fallback_queue.json"),
            list_file: data_dir.join("ACTIFIX-LIST.md"),
            rollup_file: data_dir.join("ACTIFIX.md"),
            app_state_path: state_dir.join("app_state.json"),
            module_status_path: state_dir.join("module_statuses.json"),
            legacy_fallback_queue_path: project_root.join("actifix_fallback_queue.json"),
            project_root,
            data_dir,
            state_dir,
            logs_dir,
            quarantine_dir,
        })
    }

    /// Ensure every directory this bundle names exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.project_root,
            &self.data_dir,
            &self.state_dir,
            &self.logs_dir,
            &self.quarantine_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Core artifacts that must exist and be writable for health checks.
    pub fn core_artifacts(&self) -> Vec<&Path> {
        vec![
            self.ticket_wal_path.as_path(),
            self.event_wal_path.as_path(),
            self.fallback_queue_path.as_path(),
        ]
    }
}

fn dunce_canonicalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_derive_from_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        let overrides = PathOverrides {
            project_root: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let paths = Paths::resolve(&overrides).unwrap();
        assert_eq!(paths.data_dir, tmp.path().join("actifix"));
        assert_eq!(paths.state_dir, tmp.path().join(".actifix"));
        assert_eq!(paths.quarantine_dir, paths.state_dir.join("quarantine"));
    }

    #[test]
    fn explicit_overrides_win_over_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let custom_data = tmp.path().join("custom-data");
        let overrides = PathOverrides {
            project_root: Some(tmp.path().to_path_buf()),
            data_dir: Some(custom_data.clone()),
            ..Default::default()
        };
        let paths = Paths::resolve(&overrides).unwrap();
        assert_eq!(paths.data_dir, custom_data);
    }
}
