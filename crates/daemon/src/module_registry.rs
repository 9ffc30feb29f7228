// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Module registry (§4.15): tracks which optional components are
//! active/disabled/erroring, and runs their register/unregister hooks in
//! insertion order / reverse order with a per-module unregister timeout.
//!
//! Grounded on `modules/registry.py`'s `ModuleRegistry`: the persisted
//! `module-statuses.v1` JSON schema, `mark_status`/`is_disabled`, and the
//! reverse-order `shutdown` loop with a `MODULE_UNREGISTER_TIMEOUT` event
//! on a hung unregister hook. The Python registry also lazy-imports a
//! Python module and validates a Flask blueprint's exports
//! (`validate_module_package`); Rust has no dynamic-import equivalent, so
//! this port only keeps the status bookkeeping and the hook-based
//! lifecycle, not the import/metadata-validation machinery — modules here
//! are in-process `DaemonModule` implementations registered by
//! `actifix-daemon`'s own startup code, not third-party plugins.

use actifix_core::{Event, EventLevel};
use actifix_storage::{atomic_write, EventLog};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA_VERSION: &str = "module-statuses.v1";
/// Registration/unregistration slower than this is logged as a warning.
const SLOW_THRESHOLD_MS: u128 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Active,
    Disabled,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ModuleStatuses {
    #[serde(default)]
    active: Vec<String>,
    #[serde(default)]
    disabled: Vec<String>,
    #[serde(default)]
    error: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModuleStatusFile {
    schema_version: String,
    statuses: ModuleStatuses,
}

impl Default for ModuleStatusFile {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            statuses: ModuleStatuses::default(),
        }
    }
}

/// A registered in-process component exposing a synchronous
/// register/unregister pair. Modules are unregistered in reverse
/// registration order during shutdown.
pub trait DaemonModule: Send + Sync {
    fn id(&self) -> &str;
    fn register(&self) {}
    fn unregister(&self) {}
}

struct Inner {
    statuses: ModuleStatusFile,
    registered: Vec<Box<dyn DaemonModule>>,
}

/// Persisted module status bookkeeping plus an ordered, hook-driven
/// register/unregister lifecycle.
pub struct ModuleRegistry {
    path: PathBuf,
    inner: Mutex<Inner>,
}

fn read_status_file(path: &Path) -> ModuleStatusFile {
    let Ok(raw) = std::fs::read_to_string(path) else {
        return ModuleStatusFile::default();
    };
    if raw.trim().is_empty() {
        return ModuleStatusFile::default();
    }
    match serde_json::from_str::<ModuleStatusFile>(&raw) {
        Ok(parsed) => parsed,
        Err(_) => {
            let corrupt = path.with_extension("corrupt.json");
            let _ = std::fs::write(&corrupt, &raw);
            ModuleStatusFile::default()
        }
    }
}

impl ModuleRegistry {
    pub fn open(status_path: &Path) -> Self {
        let statuses = read_status_file(status_path);
        Self {
            path: status_path.to_path_buf(),
            inner: Mutex::new(Inner {
                statuses,
                registered: Vec::new(),
            }),
        }
    }

    pub fn statuses(&self) -> HashMap<&'static str, Vec<String>> {
        let guard = self.inner.lock();
        let mut map = HashMap::new();
        map.insert("active", guard.statuses.statuses.active.clone());
        map.insert("disabled", guard.statuses.statuses.disabled.clone());
        map.insert("error", guard.statuses.statuses.error.clone());
        map
    }

    pub fn status_of(&self, module_id: &str) -> ModuleStatus {
        let guard = self.inner.lock();
        if guard.statuses.statuses.disabled.iter().any(|m| m == module_id) {
            ModuleStatus::Disabled
        } else if guard.statuses.statuses.error.iter().any(|m| m == module_id) {
            ModuleStatus::Error
        } else {
            ModuleStatus::Active
        }
    }

    pub fn is_disabled(&self, module_id: &str) -> bool {
        matches!(self.status_of(module_id), ModuleStatus::Disabled)
    }

    /// Move `module_id` into exactly one status bucket and persist.
    pub fn mark_status(&self, module_id: &str, status: ModuleStatus) {
        let mut guard = self.inner.lock();
        for bucket in [
            &mut guard.statuses.statuses.active,
            &mut guard.statuses.statuses.disabled,
            &mut guard.statuses.statuses.error,
        ] {
            bucket.retain(|m| m != module_id);
        }
        match status {
            ModuleStatus::Active => guard.statuses.statuses.active.push(module_id.to_string()),
            ModuleStatus::Disabled => guard.statuses.statuses.disabled.push(module_id.to_string()),
            ModuleStatus::Error => guard.statuses.statuses.error.push(module_id.to_string()),
        }
        guard.statuses.schema_version = SCHEMA_VERSION.to_string();
        let _ = self.persist(&guard.statuses);
    }

    fn persist(&self, statuses: &ModuleStatusFile) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(statuses).unwrap_or_default();
        atomic_write(&self.path, &content).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
    }

    /// Register a module, clearing any stale `error` status and emitting
    /// `MODULE_LIFECYCLE_REGISTERED` (or `MODULE_REGISTRATION_SLOW` past
    /// the 2s budget).
    pub fn register(&self, module: Box<dyn DaemonModule>, event_log: &EventLog) {
        let id = module.id().to_string();
        let start = std::time::Instant::now();
        module.register();
        let elapsed_ms = start.elapsed().as_millis();

        if matches!(self.status_of(&id), ModuleStatus::Error) {
            self.mark_status(&id, ModuleStatus::Active);
            let _ = event_log.record(Event::new(
                "MODULE_STATUS_CLEARED",
                EventLevel::Info,
                format!("module {id} error status cleared after successful registration"),
            ));
        }

        let _ = event_log.record(Event::new(
            "MODULE_LIFECYCLE_REGISTERED",
            EventLevel::Info,
            format!("module registered: {id}"),
        ));
        if elapsed_ms > SLOW_THRESHOLD_MS {
            let _ = event_log.record(Event::new(
                "MODULE_REGISTRATION_SLOW",
                EventLevel::Warning,
                format!("module registration exceeded 2s threshold: {id} ({elapsed_ms}ms)"),
            ));
        }

        self.inner.lock().registered.push(module);
    }

    /// Unregister every module in reverse registration order, bounding
    /// each hook by `timeout_per_module`. A hook running on the current
    /// thread can't be cancelled mid-flight in safe Rust, so the timeout
    /// is enforced by running the hook on a scoped thread and not waiting
    /// past the deadline for its result; a still-running hook is recorded
    /// and left to finish on its own, matching the original's
    /// thread-pool-with-timeout shape.
    pub fn shutdown(&self, event_log: &EventLog, timeout_per_module: Duration) {
        let modules = std::mem::take(&mut self.inner.lock().registered);
        for module in modules.into_iter().rev() {
            let id = module.id().to_string();
            let start = std::time::Instant::now();
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                module.unregister();
                let _ = tx.send(());
            });

            match rx.recv_timeout(timeout_per_module) {
                Ok(()) => {
                    let elapsed_ms = start.elapsed().as_millis();
                    let _ = event_log.record(Event::new(
                        "MODULE_LIFECYCLE_UNREGISTERED",
                        EventLevel::Info,
                        format!("module unregistered: {id} ({elapsed_ms}ms)"),
                    ));
                }
                Err(_) => {
                    let _ = event_log.record(Event::new(
                        "MODULE_UNREGISTER_TIMEOUT",
                        EventLevel::Error,
                        format!(
                            "module unregister timeout: {id} (>{}s)",
                            timeout_per_module.as_secs()
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actifix_core::Paths;
    use tempfile::tempdir;

    struct NoopModule(&'static str);
    impl DaemonModule for NoopModule {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn mark_status_moves_module_between_buckets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("module_statuses.json");
        let registry = ModuleRegistry::open(&path);
        registry.mark_status("webhooks", ModuleStatus::Disabled);
        assert!(registry.is_disabled("webhooks"));
        registry.mark_status("webhooks", ModuleStatus::Active);
        assert!(!registry.is_disabled("webhooks"));
    }

    #[test]
    fn status_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("module_statuses.json");
        {
            let registry = ModuleRegistry::open(&path);
            registry.mark_status("dispatcher", ModuleStatus::Error);
        }
        let reopened = ModuleRegistry::open(&path);
        assert_eq!(reopened.status_of("dispatcher"), ModuleStatus::Error);
    }

    #[test]
    fn shutdown_unregisters_in_reverse_order() {
        let dir = tempdir().unwrap();
        let events = EventLog::open(&dir.path().join("events.wal")).unwrap();
        let registry = ModuleRegistry::open(&dir.path().join("module_statuses.json"));
        registry.register(Box::new(NoopModule("a")), &events);
        registry.register(Box::new(NoopModule("b")), &events);
        registry.shutdown(&events, Duration::from_secs(1));

        let filter = actifix_core::EventFilter::default();
        let recorded = events.query(&filter);
        let unregistered: Vec<&str> = recorded
            .iter()
            .rev()
            .filter(|e| e.event_type == "MODULE_LIFECYCLE_UNREGISTERED")
            .map(|e| e.message.as_str())
            .collect();
        assert!(unregistered[0].contains('a'));
        assert!(unregistered[1].contains('b'));
        let _ = Paths::resolve(&Default::default());
    }
}
