// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actifix daemon (`actifixd`).
//!
//! Owns every durable store, serves the HTTP API (C13), and runs a
//! periodic dispatch loop that hands open tickets to the configured AI
//! provider chain (C11). Typically started once per project root and
//! left running; the CLI and any `raise_af`-compatible caller talk to
//! it over HTTP rather than touching the stores directly.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use actifix_adapters::ai::{
    AiClient, ClaudeApiAdapter, ClaudeLocalAdapter, FreeAlternativeAdapter, OllamaAdapter,
    OpenAiApiAdapter, OpenAiCliAdapter, ProviderAdapter, resolve_provider_selection,
    DEFAULT_FREE_MODEL,
};
use actifix_adapters::webhook::WebhookSender;
use actifix_core::PathOverrides;
use actifix_daemon::ai_bridge::{AiFixHandler, LedgerRateLimitGate};
use actifix_daemon::http::{self, HttpState};
use actifix_daemon::{lifecycle, LifecycleError};
use actifix_engine::Dispatcher;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

/// How often the dispatch loop polls for claimable tickets.
const DISPATCH_INTERVAL: Duration = Duration::from_secs(15);
/// Max tickets claimed per dispatch tick, so one noisy source can't
/// starve the HTTP server of CPU.
const DISPATCH_BATCH: usize = 5;
/// Retries per AI provider before the dispatcher moves to the next.
const AI_MAX_RETRIES: u32 = 2;
const AI_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;
const MAX_ROTATED_LOGS: u32 = 3;
const STARTUP_MARKER_PREFIX: &str = "--- actifixd: starting (pid: ";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("actifixd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("actifixd {}", env!("CARGO_PKG_VERSION"));
                println!("Actifix daemon - owns the ticket stores and serves the HTTP API");
                println!();
                println!("USAGE:");
                println!("    actifixd");
                println!();
                println!("The daemon is typically started once per project root (by the");
                println!("`actifix` CLI or a process supervisor) and left running. Callers");
                println!("talk to it over HTTP at ACTIFIX_API_BASE_URL.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: actifixd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let overrides = PathOverrides::default();
    let paths = actifix_core::Paths::resolve(&overrides)?;
    paths.ensure_dirs()?;
    let log_path = paths.logs_dir.join("actifixd.log");

    rotate_log_if_needed(&log_path);
    write_startup_marker(&log_path)?;
    let _log_guard = setup_logging(&log_path)?;

    info!("starting actifixd");

    let startup = match lifecycle::startup(&overrides) {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(lock_path)) => {
            eprintln!("actifixd is already running against this project root");
            eprintln!("  lock: {}", lock_path.display());
            std::process::exit(1);
        }
        Err(e) => {
            write_startup_error(&log_path, &e);
            error!(error = %e, "failed to start actifixd");
            return Err(e.into());
        }
    };
    let state = startup.state;

    let ai_client = Arc::new(build_ai_client(&state));
    let ai_selection = resolve_provider_selection(
        state.config.ai_provider.as_deref(),
        state.config.ai_model.as_deref(),
    );
    let webhook_sender = Arc::new(WebhookSender::new());

    let http_state = HttpState {
        app: Arc::clone(&state),
        ai_client: Arc::clone(&ai_client),
        ai_selection: ai_selection.clone(),
        ai_max_retries: AI_MAX_RETRIES,
        webhook_sender,
    };
    let app = http::router(http_state);

    let bind_addr = std::env::var("ACTIFIX_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8731".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "actifixd listening");
    println!("READY");

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "http server exited");
        }
    });

    let dispatcher = Dispatcher::new(
        Arc::clone(&state.ticket_store),
        Arc::clone(&state.event_log),
        Arc::clone(&state.clock),
        "actifixd-dispatch",
        lifecycle::DEFAULT_LEASE_MS,
    );
    let fix_handler: Arc<dyn actifix_engine::FixHandler> = Arc::new(AiFixHandler::new(
        build_ai_client(&state),
        ai_selection,
        AI_MAX_RETRIES,
    ));

    let dispatch_state = Arc::clone(&state);
    let dispatch_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(DISPATCH_INTERVAL);
        loop {
            interval.tick().await;
            if !dispatch_state.config.ai_enabled {
                continue;
            }
            // `process_tickets` is synchronous; `AiFixHandler::handle` is
            // the one that crosses into async land via `block_in_place`,
            // so no extra wrapping is needed at this call site.
            match dispatcher.process_tickets(DISPATCH_BATCH, fix_handler.as_ref()) {
                Ok(n) if n > 0 => info!(dispatched = n, "dispatch tick processed tickets"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "dispatch tick failed"),
            }
        }
    });

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
        _ = http_handle => warn!("http server task ended unexpectedly"),
    }

    dispatch_task.abort();
    lifecycle::shutdown(&state);
    info!("actifixd stopped");
    Ok(())
}

/// `AiClient` doesn't implement `Clone` (its rate limiter is boxed), so
/// the dispatch loop builds its own client from the same config rather
/// than sharing the HTTP layer's instance. Both read the same
/// `RateLimiter` ledger underneath, so usage accounting stays unified.
fn build_ai_client(state: &lifecycle::AppState) -> AiClient {
    let config = &state.config;
    let mut adapters: Vec<Box<dyn ProviderAdapter>> = Vec::new();

    adapters.push(Box::new(ClaudeLocalAdapter::new(AI_PROVIDER_TIMEOUT)));
    adapters.push(Box::new(OpenAiCliAdapter));
    adapters.push(Box::new(ClaudeApiAdapter::new(config.ai_api_key.clone())));
    adapters.push(Box::new(OpenAiApiAdapter::new(config.ai_api_key.clone())));
    adapters.push(Box::new(OllamaAdapter::new(
        config.ollama_model.clone(),
        AI_PROVIDER_TIMEOUT,
    )));
    adapters.push(Box::new(FreeAlternativeAdapter::new(
        DEFAULT_FREE_MODEL,
        config.ai_api_key.clone(),
    )));

    let rate_limiter = Box::new(LedgerRateLimitGate::new(Arc::clone(&state.rate_limiter)));
    AiClient::new(adapters, rate_limiter)
}

fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn write_startup_marker(log_path: &Path) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

fn write_startup_error(log_path: &Path, error: &LifecycleError) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start actifixd: {error}");
}

fn setup_logging(log_path: &Path) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "log path has no parent"))?;
    std::fs::create_dir_all(parent)?;

    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "log path has no file name"))?;
    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
