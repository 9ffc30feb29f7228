// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C15: startup and shutdown.
//!
//! Startup resolves paths, ensures directories exist, takes an
//! exclusive lock on a PID file so a second daemon can't start against
//! the same project root, opens every durable store, opportunistically
//! drains the fallback queue, checks the previous `app_state.json` for
//! an unclean shutdown, and records `BOOTSTRAP_COMPLETE`. Shutdown
//! unregisters modules in reverse order, checkpoints every store, and
//! marks the lifecycle state `Healthy`.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actifix_core::{
    AppLifecycleState, Clock, Config, ConfigMode, CrashSnapshot, Event, EventLevel, Paths,
    PathOverrides, SystemClock,
};
use actifix_storage::{atomic_write, EventLog, FallbackQueue, TicketStore};
use actifix_engine::{RateLimiter, Throttler};
use fs2::FileExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::module_registry::ModuleRegistry;

/// Default ticket lock lease, matching the original's `ticket_repo.py`
/// default (`timedelta(hours=1)`).
pub const DEFAULT_LEASE_MS: i64 = 3_600_000;
/// Entries older than this are dropped from the fallback queue
/// regardless of retry count (7 days).
const FALLBACK_MAX_AGE_MS: i64 = 7 * 24 * 60 * 60 * 1000;
const FALLBACK_MAX_ENTRIES: usize = 10_000;
/// Per-module shutdown budget, matching the ported registry's default.
const MODULE_UNREGISTER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another actifixd instance is already running against this project root (lock: {0})")]
    LockFailed(PathBuf),
    #[error("failed to resolve paths: {0}")]
    Paths(#[source] std::io::Error),
    #[error("failed to open a durable store: {0}")]
    Storage(String),
    #[error("invalid configuration: {0:?}")]
    Config(Vec<actifix_core::ConfigError>),
}

/// Everything the HTTP layer and the dispatch loop share.
pub struct AppState {
    pub paths: Paths,
    pub config: Config,
    pub clock: Arc<SystemClock>,
    pub ticket_store: Arc<TicketStore>,
    pub event_log: Arc<EventLog>,
    pub fallback_queue: Arc<FallbackQueue>,
    pub throttler: Arc<Throttler>,
    pub rate_limiter: Arc<RateLimiter>,
    pub module_registry: Arc<ModuleRegistry>,
    pub start_time_ms: i64,
    /// Held for the process lifetime; dropping it releases the lock.
    lock_file: File,
}

pub struct StartupResult {
    pub state: Arc<AppState>,
}

/// Acquire an exclusive advisory lock on `state_dir/actifixd.lock`,
/// mapping an already-held lock to a friendly error instead of the raw
/// OS error.
fn acquire_lock(paths: &Paths) -> Result<File, LifecycleError> {
    let lock_path = paths.state_dir.join("actifixd.lock");
    let file = File::create(&lock_path).map_err(LifecycleError::Paths)?;
    file.try_lock_exclusive().map_err(|_| LifecycleError::LockFailed(lock_path))?;
    Ok(file)
}

fn read_app_lifecycle_state(path: &PathBuf) -> Option<AppLifecycleState> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<CrashSnapshot>(&raw).ok().map(|s| s.app_state)
}

fn write_app_lifecycle_state(path: &PathBuf, state: AppLifecycleState, now_ms: i64) {
    let snapshot = CrashSnapshot {
        timestamp_ms: now_ms,
        app_state: state,
        memory_mb: 0.0,
        db_size_bytes: 0,
        open_tx: 0,
        pending_writes: 0,
    };
    if let Ok(content) = serde_json::to_string_pretty(&snapshot) {
        let _ = atomic_write(path, &content);
    }
}

/// Full startup sequence (§4.15): resolve paths, lock, open every
/// durable store, drain the fallback queue, and emit `BOOTSTRAP_COMPLETE`.
pub fn startup(overrides: &PathOverrides) -> Result<StartupResult, LifecycleError> {
    let (config, errors) = Config::load_tolerant();
    if !errors.is_empty() {
        for err in &errors {
            warn!(error = %err, "configuration validation warning");
        }
    }
    if config.project_root_must_exist {
        if let Err(e) = Config::load(ConfigMode::FailFast) {
            return Err(LifecycleError::Config(e));
        }
    }

    let paths = Paths::resolve(overrides).map_err(LifecycleError::Paths)?;
    paths.ensure_dirs().map_err(LifecycleError::Paths)?;

    let lock_file = acquire_lock(&paths)?;

    let clock = Arc::new(SystemClock);
    let now_ms = clock.now_ms();

    let previous_state = read_app_lifecycle_state(&paths.app_state_path);
    if let Some(state) = previous_state {
        if state.implies_unclean_shutdown() {
            warn!("previous actifixd shutdown did not complete cleanly");
        }
    }
    write_app_lifecycle_state(&paths.app_state_path, AppLifecycleState::Running, now_ms);

    let ticket_store = Arc::new(
        TicketStore::open(&paths.ticket_wal_path, &paths.data_dir.join("tickets.snapshot.json"))
            .map_err(|e| LifecycleError::Storage(e.to_string()))?,
    );
    let event_log = Arc::new(
        EventLog::open(&paths.event_wal_path).map_err(|e| LifecycleError::Storage(e.to_string()))?,
    );
    let fallback_queue = Arc::new(
        FallbackQueue::open(&paths.fallback_queue_path, FALLBACK_MAX_ENTRIES, FALLBACK_MAX_AGE_MS, now_ms)
            .map_err(|e| LifecycleError::Storage(e.to_string()))?,
    );
    let throttler = Arc::new(
        Throttler::open(&paths.throttle_ledger_path, &config, now_ms)
            .map_err(|e| LifecycleError::Storage(e.to_string()))?,
    );
    let rate_limiter = Arc::new(
        RateLimiter::open(&paths.rate_limit_ledger_path, now_ms)
            .map_err(|e| LifecycleError::Storage(e.to_string()))?,
    );

    let module_registry = Arc::new(ModuleRegistry::open(&paths.module_status_path));

    let replayed = fallback_queue
        .replay(
            |entry| {
                let Ok(ticket) = serde_json::from_value::<actifix_core::Ticket>(entry.content.clone()) else {
                    return true;
                };
                ticket_store.create_ticket(ticket).unwrap_or(false)
            },
            5,
            now_ms,
        )
        .map_err(|e| LifecycleError::Storage(e.to_string()))?;
    if replayed.succeeded > 0 || replayed.failed > 0 {
        info!(
            succeeded = replayed.succeeded,
            failed = replayed.failed,
            skipped = replayed.skipped,
            "fallback queue drained at startup"
        );
    }

    let _ = event_log.record(Event::new(
        "BOOTSTRAP_COMPLETE",
        EventLevel::Info,
        "actifixd startup complete",
    ));

    let state = Arc::new(AppState {
        paths,
        config,
        clock,
        ticket_store,
        event_log,
        fallback_queue,
        throttler,
        rate_limiter,
        module_registry,
        start_time_ms: now_ms,
        lock_file,
    });

    Ok(StartupResult { state })
}

/// Reverse-order module unregister, checkpoint every durable store, and
/// mark the lifecycle state healthy.
pub fn shutdown(state: &AppState) {
    state.module_registry.shutdown(&state.event_log, MODULE_UNREGISTER_TIMEOUT);

    let now_ms = state.clock.now_ms();
    write_app_lifecycle_state(&state.paths.app_state_path, AppLifecycleState::ShuttingDown, now_ms);

    if let Err(e) = state.ticket_store.checkpoint() {
        warn!(error = %e, "ticket store checkpoint failed during shutdown");
    }
    if let Err(e) = state.event_log.checkpoint() {
        warn!(error = %e, "event log checkpoint failed during shutdown");
    }
    if let Err(e) = state.throttler.checkpoint() {
        warn!(error = %e, "throttle ledger checkpoint failed during shutdown");
    }
    if let Err(e) = state.rate_limiter.checkpoint() {
        warn!(error = %e, "rate limit ledger checkpoint failed during shutdown");
    }

    let now_ms = state.clock.now_ms();
    write_app_lifecycle_state(&state.paths.app_state_path, AppLifecycleState::Healthy, now_ms);

    // Lock is released on drop when `state` (and its last `Arc`) goes away.
    let _ = &state.lock_file;
}
