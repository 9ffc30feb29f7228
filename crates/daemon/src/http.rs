// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C13: the HTTP API. Every handler is a thin adapter over the engine
//! and storage crates; ticket creation always goes through
//! `IngestionPipeline::record_error`, never a direct `TicketStore`
//! write, and every writable endpoint checks the origin gate first.
//!
//! Grounded on spec.md §6's exhaustive endpoint list; the Flask/HTTP
//! framing itself is out of scope, so response shapes follow the
//! documented JSON contract rather than mirroring any particular
//! original handler module.

use std::collections::HashMap;
use std::sync::Arc;

use actifix_adapters::ai::{AiClient, ProviderSelection};
use actifix_adapters::webhook::{WebhookEvent, WebhookSender};
use actifix_core::{Clock, EventFilter, EventLevel, SystemClock, Ticket, TicketFilter, UuidIdGen};
use actifix_engine::{check_origin_gate, get_health, render_prometheus, ErrorReport, IngestionPipeline};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::lifecycle::AppState;

/// The HTTP-layer-only extras that sit alongside the lifecycle-owned
/// `AppState`: the AI client and webhook sender are built from config
/// in `main.rs`, not during `lifecycle::startup`, since they depend on
/// network clients the lifecycle module has no reason to know about.
#[derive(Clone)]
pub struct HttpState {
    pub app: Arc<AppState>,
    pub ai_client: Arc<AiClient>,
    pub ai_selection: ProviderSelection,
    pub ai_max_retries: u32,
    pub webhook_sender: Arc<WebhookSender>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/health", get(get_health_handler))
        .route("/api/stats", get(get_stats))
        .route("/api/tickets", get(get_tickets))
        .route("/api/fix-ticket", post(post_fix_ticket))
        .route("/api/logs", get(get_logs))
        .route("/api/system", get(get_system))
        .route("/api/version", get(get_version))
        .route("/api/ping", get(get_ping))
        .route("/api/ai-status", get(get_ai_status))
        .route("/api/settings", get(get_settings).post(post_settings))
        .route("/api/modules", get(get_modules))
        .route("/metrics", get(get_metrics))
        .route("/ingest/sentry", post(post_ingest_sentry))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn origin_gate_response(state: &HttpState) -> Option<Response> {
    check_origin_gate(&state.app.config)
        .err()
        .map(|e| error_response(StatusCode::FORBIDDEN, e.to_string()))
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn iso_ms(ms: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

async fn get_health_handler(State(state): State<HttpState>) -> Response {
    let stats = state.app.ticket_store.get_stats();
    let now_ms = state.app.clock.now_ms();
    let snapshot = get_health(&state.app.ticket_store, &stats, &state.app.paths, &state.app.config, None, now_ms);

    let oldest_ticket_age_hours = state
        .app
        .ticket_store
        .get_tickets(&TicketFilter {
            status: Some(actifix_core::TicketStatus::Open),
            ..Default::default()
        })
        .iter()
        .map(|t| t.sla_hours_elapsed(now_ms))
        .fold(0.0_f64, f64::max);

    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    if !snapshot.sla_breaches.is_empty() {
        warnings.push(format!("{} ticket(s) breaching SLA", snapshot.sla_breaches.len()));
    }
    if !snapshot.missing_artifacts.is_empty() {
        errors.push(format!("missing/unwritable artifacts: {}", snapshot.missing_artifacts.join(", ")));
    }

    Json(json!({
        "healthy": matches!(snapshot.status, actifix_engine::Status::Ok),
        "status": snapshot.status.as_str(),
        "timestamp": iso_ms(now_ms),
        "metrics": {
            "open": snapshot.open,
            "completed": snapshot.completed,
            "sla_breaches": snapshot.sla_breaches.len(),
            "oldest_ticket_age_hours": oldest_ticket_age_hours,
        },
        "filesystem": {
            "files_exist": snapshot.missing_artifacts.is_empty(),
            "files_writable": snapshot.missing_artifacts.is_empty(),
        },
        "warnings": warnings,
        "errors": errors,
        "details": {
            "by_priority": snapshot.by_priority,
            "locked": snapshot.locked,
            "sla_breaching_tickets": snapshot.sla_breaches,
            "disk_usage": snapshot.disk_usage.iter().map(|d| json!({
                "path": d.path.display().to_string(),
                "used_pct": d.used_pct,
                "status": d.status.as_str(),
            })).collect::<Vec<_>>(),
            "db_size_bytes": snapshot.db_size_bytes,
        },
    }))
    .into_response()
}

async fn get_stats(State(state): State<HttpState>) -> Response {
    let stats = state.app.ticket_store.get_stats();
    let now_ms = state.app.clock.now_ms();
    let sla_breaches = state
        .app
        .ticket_store
        .get_tickets(&TicketFilter {
            status: Some(actifix_core::TicketStatus::Open),
            ..Default::default()
        })
        .into_iter()
        .filter(|t| {
            state
                .app
                .config
                .sla_hours(t.priority)
                .is_some_and(|hours| t.sla_hours_elapsed(now_ms) > hours as f64)
        })
        .count();

    Json(json!({
        "total": stats.total,
        "open": stats.by_status.get("Open").copied().unwrap_or(0),
        "completed": stats.by_status.get("Completed").copied().unwrap_or(0),
        "by_priority": stats.by_priority,
        "sla_breaches": sla_breaches,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct TicketsQuery {
    limit: Option<usize>,
}

fn ticket_summary(t: &Ticket) -> Value {
    json!({
        "ticket_id": t.id.as_str(),
        "error_type": t.error_type,
        "message": truncate_chars(&t.message, 100),
        "source": t.source,
        "priority": t.priority.as_str(),
        "created": iso_ms(t.created_at_ms),
        "status": t.status.as_str(),
    })
}

async fn get_tickets(State(state): State<HttpState>, Query(q): Query<TicketsQuery>) -> Response {
    let mut filter = TicketFilter::default();
    filter.limit = q.limit;
    let tickets = state.app.ticket_store.get_tickets(&filter);
    let stats = state.app.ticket_store.get_stats();

    Json(json!({
        "tickets": tickets.iter().map(ticket_summary).collect::<Vec<_>>(),
        "total_open": stats.by_status.get("Open").copied().unwrap_or(0),
        "total_completed": stats.by_status.get("Completed").copied().unwrap_or(0),
    }))
    .into_response()
}

#[derive(Debug, Deserialize, Default)]
struct FixTicketBody {
    completion_notes: Option<String>,
    test_steps: Option<String>,
    test_results: Option<String>,
    summary: Option<String>,
    test_documentation_url: Option<String>,
}

fn ticket_webhook_map(t: &Ticket) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("id".to_string(), json!(t.id.as_str()));
    map.insert("priority".to_string(), json!(t.priority.as_str()));
    map.insert("error_type".to_string(), json!(t.error_type));
    map.insert("message".to_string(), json!(t.message));
    map.insert("source".to_string(), json!(t.source));
    map.insert("run_label".to_string(), json!(t.run_label));
    map.insert("created_at".to_string(), json!(iso_ms(t.created_at_ms)));
    map.insert("updated_at".to_string(), json!(iso_ms(t.updated_at_ms)));
    map.insert("status".to_string(), json!(t.status.as_str()));
    if let Some(correlation_id) = &t.correlation_id {
        map.insert("correlation_id".to_string(), json!(correlation_id));
    }
    map
}

async fn post_fix_ticket(State(state): State<HttpState>, Json(body): Json<FixTicketBody>) -> Response {
    if let Some(resp) = origin_gate_response(&state) {
        return resp;
    }

    let now_ms = state.app.clock.now_ms();
    let claimed = state.app.ticket_store.get_and_lock_next_ticket("http-api", now_ms, crate::lifecycle::DEFAULT_LEASE_MS, None);
    let Ok(Some(ticket)) = claimed else {
        return Json(json!({ "dispatched": false, "reason": "no open tickets" })).into_response();
    };

    let summary = body
        .summary
        .or(body.completion_notes)
        .unwrap_or_else(|| "resolved via /api/fix-ticket".to_string());
    let full_summary = [
        Some(summary.clone()),
        body.test_steps.map(|s| format!("Test steps: {s}")),
        body.test_results.map(|s| format!("Test results: {s}")),
        body.test_documentation_url.map(|s| format!("Test documentation: {s}")),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join("\n");

    if let Err(e) = state.app.ticket_store.mark_complete(&ticket.id, now_ms, Some(full_summary)) {
        let _ = state.app.ticket_store.release_lock(&ticket.id, "http-api");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    let _ = state.app.event_log.record(
        actifix_core::Event::new("TICKET_COMPLETED", EventLevel::Info, format!("{} completed via /api/fix-ticket", ticket.id))
            .with_ticket(ticket.id.clone()),
    );

    if !state.app.config.webhook_urls.is_empty() {
        let sender = Arc::clone(&state.webhook_sender);
        let urls = state.app.config.webhook_urls.clone();
        let payload = ticket_webhook_map(&ticket);
        let now_iso = iso_ms(now_ms);
        tokio::spawn(async move {
            let (_succeeded, _attempts) = sender.send(WebhookEvent::TicketCompleted, &payload, &urls, &now_iso).await;
        });
    }

    Json(json!({ "dispatched": true, "ticket_id": ticket.id.as_str() })).into_response()
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(rename = "type")]
    log_type: Option<String>,
    lines: Option<usize>,
}

async fn get_logs(State(state): State<HttpState>, Query(q): Query<LogsQuery>) -> Response {
    let mut filter = EventFilter::default();
    filter.limit = Some(q.lines.unwrap_or(100));
    filter.level = match q.log_type.as_deref() {
        Some("errors") => Some(EventLevel::Error),
        _ => None,
    };
    let events = state.app.event_log.query(&filter);

    Json(json!({
        "entries": events.iter().map(|e| json!({
            "timestamp": iso_ms(e.timestamp_ms),
            "event_type": e.event_type,
            "level": e.level.as_str(),
            "message": e.message,
            "ticket_id": e.ticket_id.as_ref().map(|id| id.as_str().to_string()),
            "source": e.source,
        })).collect::<Vec<_>>(),
    }))
    .into_response()
}

async fn get_system(State(state): State<HttpState>) -> Response {
    let now_ms = state.app.clock.now_ms();
    Json(json!({
        "project_root": state.app.paths.project_root.display().to_string(),
        "data_dir": state.app.paths.data_dir.display().to_string(),
        "state_dir": state.app.paths.state_dir.display().to_string(),
        "uptime_ms": now_ms - state.app.start_time_ms,
        "platform": std::env::consts::OS,
    }))
    .into_response()
}

async fn get_version() -> Response {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") })).into_response()
}

async fn get_ping() -> Response {
    Json(json!({ "status": "pong" })).into_response()
}

async fn get_ai_status(State(state): State<HttpState>) -> Response {
    let status = state.ai_client.get_status(&state.ai_selection);
    Json(json!({
        "preferred_provider": status.preferred_provider,
        "preferred_model": status.preferred_model,
        "active_provider": status.active_provider,
        "active_model": status.active_model,
        "provider_order": status.provider_order,
        "availability": status.availability,
    }))
    .into_response()
}

async fn get_settings(State(state): State<HttpState>) -> Response {
    let config = &state.app.config;
    Json(json!({
        "sla_p0_hours": config.sla_p0_hours,
        "sla_p1_hours": config.sla_p1_hours,
        "sla_p2_hours": config.sla_p2_hours,
        "sla_p3_hours": config.sla_p3_hours,
        "max_p2_tickets_per_hour": config.max_p2_tickets_per_hour,
        "max_p3_tickets_per_4h": config.max_p3_tickets_per_4h,
        "max_p4_tickets_per_day": config.max_p4_tickets_per_day,
        "emergency_ticket_threshold": config.emergency_ticket_threshold,
        "emergency_window_minutes": config.emergency_window_minutes,
        "ai_enabled": config.ai_enabled,
        "ai_provider": config.ai_provider,
        "ai_model": config.ai_model,
        "capture_enabled": config.capture_enabled,
        "enforce_raise_af": config.enforce_raise_af,
        "cleanup_retention_days": config.cleanup_retention_days,
        "webhook_urls": config.webhook_urls,
    }))
    .into_response()
}

/// `Config` is env-sourced and immutable for the life of the process
/// (§4.1); settings aren't writable at runtime without a restart, so
/// this mirrors the original's read-modify-persist-to-env-file pattern
/// only as far as rejecting the write with the reason, rather than
/// silently discarding it.
async fn post_settings(State(state): State<HttpState>) -> Response {
    if let Some(resp) = origin_gate_response(&state) {
        return resp;
    }
    error_response(
        StatusCode::NOT_IMPLEMENTED,
        "settings are sourced from ACTIFIX_* environment variables; restart the daemon to apply changes",
    )
}

async fn get_modules(State(state): State<HttpState>) -> Response {
    let statuses = state.app.module_registry.statuses();
    Json(json!({ "statuses": statuses })).into_response()
}

async fn get_metrics(State(state): State<HttpState>) -> Response {
    let stats = state.app.ticket_store.get_stats();
    let now_ms = state.app.clock.now_ms();
    let snapshot = get_health(&state.app.ticket_store, &stats, &state.app.paths, &state.app.config, None, now_ms);
    (
        [("content-type", "text/plain; version=0.0.4")],
        render_prometheus(&snapshot),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SentryFrame {
    filename: Option<String>,
    function: Option<String>,
    lineno: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SentryStacktrace {
    #[serde(default)]
    frames: Vec<SentryFrame>,
}

#[derive(Debug, Deserialize)]
struct SentryException {
    #[serde(rename = "type")]
    exc_type: Option<String>,
    value: Option<String>,
    stacktrace: Option<SentryStacktrace>,
}

#[derive(Debug, Deserialize)]
struct SentryExceptionValues {
    #[serde(default)]
    values: Vec<SentryException>,
}

#[derive(Debug, Deserialize)]
struct SentryEvent {
    level: Option<String>,
    message: Option<String>,
    exception: Option<SentryExceptionValues>,
}

fn sentry_priority(level: &str) -> actifix_core::Priority {
    use actifix_core::Priority::*;
    match level {
        "fatal" => P0,
        "error" => P1,
        "warning" => P2,
        "info" => P3,
        "debug" => P4,
        _ => P2,
    }
}

fn sentry_error_report(event: SentryEvent) -> ErrorReport {
    let exception = event
        .exception
        .as_ref()
        .and_then(|values| values.values.first());

    let message = exception
        .and_then(|e| e.value.clone())
        .or(event.message)
        .unwrap_or_else(|| "sentry event".to_string());
    let error_type = exception
        .and_then(|e| e.exc_type.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let innermost_frame = exception
        .and_then(|e| e.stacktrace.as_ref())
        .and_then(|st| st.frames.last());
    let source = innermost_frame
        .map(|f| {
            let file = f.filename.as_deref().unwrap_or("unknown");
            let line = f.lineno.unwrap_or(0);
            let func = f.function.as_deref().unwrap_or("?");
            format!("{file}:{line} in {func}")
        })
        .unwrap_or_else(|| "sentry".to_string());

    let stack_trace = innermost_frame.map(|_| {
        exception
            .and_then(|e| e.stacktrace.as_ref())
            .map(|st| {
                st.frames
                    .iter()
                    .map(|f| {
                        format!(
                            "  File \"{}\", line {}, in {}",
                            f.filename.as_deref().unwrap_or("?"),
                            f.lineno.unwrap_or(0),
                            f.function.as_deref().unwrap_or("?"),
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    });

    let priority = sentry_priority(event.level.as_deref().unwrap_or("error"));

    let mut report = ErrorReport::new(message, source);
    report.error_type = Some(error_type);
    report.priority = Some(priority);
    report.stack_trace = stack_trace;
    report
}

async fn post_ingest_sentry(State(state): State<HttpState>, Json(event): Json<SentryEvent>) -> Response {
    if let Some(resp) = origin_gate_response(&state) {
        return resp;
    }

    let pipeline = IngestionPipeline::new(
        Arc::clone(&state.app.ticket_store),
        Arc::clone(&state.app.event_log),
        Arc::clone(&state.app.fallback_queue),
        Arc::clone(&state.app.throttler),
        state.app.config.clone(),
        Arc::new(SystemClock),
        UuidIdGen,
    );

    let report = sentry_error_report(event);
    match pipeline.record_error(report) {
        Ok(Some(ticket)) => Json(json!({ "ticket_id": ticket.id.as_str() })).into_response(),
        Ok(None) => Json(json!({ "ticket_id": Value::Null })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentry_priority_maps_every_level() {
        assert_eq!(sentry_priority("fatal"), actifix_core::Priority::P0);
        assert_eq!(sentry_priority("debug"), actifix_core::Priority::P4);
        assert_eq!(sentry_priority("unknown"), actifix_core::Priority::P2);
    }

    #[test]
    fn sentry_error_report_extracts_innermost_frame() {
        let event = SentryEvent {
            level: Some("error".to_string()),
            message: None,
            exception: Some(SentryExceptionValues {
                values: vec![SentryException {
                    exc_type: Some("ValueError".to_string()),
                    value: Some("bad input".to_string()),
                    stacktrace: Some(SentryStacktrace {
                        frames: vec![
                            SentryFrame { filename: Some("a.py".to_string()), function: Some("outer".to_string()), lineno: Some(1) },
                            SentryFrame { filename: Some("b.py".to_string()), function: Some("inner".to_string()), lineno: Some(42) },
                        ],
                    }),
                }],
            }),
        };
        let report = sentry_error_report(event);
        assert_eq!(report.message, "bad input");
        assert_eq!(report.error_type.as_deref(), Some("ValueError"));
        assert!(report.source.contains("b.py:42"));
        assert_eq!(report.priority, Some(actifix_core::Priority::P1));
    }
}
