// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C9: the ingestion pipeline, the hot path every error report runs
//! through on its way to becoming a ticket.
//!
//! Grounded on `raise_af.record_error` and its helpers
//! (`generate_duplicate_guard`, `_truncate_context_text`,
//! `capture_file_context`, `capture_system_state`).

use crate::classify::classify_priority;
use crate::error::EngineError;
use crate::redact::redact;
use crate::throttle::Throttler;
use actifix_core::{
    Config, Event, EventLevel, FallbackOperation, IdGen, Priority, Ticket, TicketStatus,
};
use actifix_storage::{EventLog, FallbackQueue, TicketStore};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;

static PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\S+/").expect("static path regex"));
static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static digits regex"));

/// Inputs to a single `record_error` call. Everything but `message` and
/// `source` is optional and falls back to auto-detection.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub source: String,
    pub run_label: Option<String>,
    pub error_type: Option<String>,
    pub priority: Option<Priority>,
    pub stack_trace: Option<String>,
    pub correlation_id: Option<String>,
    pub capture_context: bool,
}

impl ErrorReport {
    pub fn new(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
            run_label: None,
            error_type: None,
            priority: None,
            stack_trace: None,
            correlation_id: None,
            capture_context: true,
        }
    }
}

pub struct IngestionPipeline<C: actifix_core::Clock, G: IdGen> {
    ticket_store: Arc<TicketStore>,
    event_log: Arc<EventLog>,
    fallback_queue: Arc<FallbackQueue>,
    throttler: Arc<Throttler>,
    config: Config,
    clock: Arc<C>,
    id_gen: G,
}

impl<C: actifix_core::Clock, G: IdGen> IngestionPipeline<C, G> {
    pub fn new(
        ticket_store: Arc<TicketStore>,
        event_log: Arc<EventLog>,
        fallback_queue: Arc<FallbackQueue>,
        throttler: Arc<Throttler>,
        config: Config,
        clock: Arc<C>,
        id_gen: G,
    ) -> Self {
        Self {
            ticket_store,
            event_log,
            fallback_queue,
            throttler,
            config,
            clock,
            id_gen,
        }
    }

    /// Run the full `record_error` pipeline. Returns `Ok(None)` for every
    /// policy-driven no-op path (origin gate rejected silently upstream,
    /// duplicate, capture disabled, throttled) — those are not errors,
    /// they're the pipeline doing its job.
    pub fn record_error(&self, report: ErrorReport) -> Result<Option<Ticket>, EngineError> {
        let now_ms = self.clock.now_ms();

        // Step 1: origin gate.
        check_origin_gate(&self.config)?;

        // Step 2: normalise.
        let message = non_empty_or(report.message.trim(), "");
        let source = non_empty_or(report.source.trim(), "unspecified");
        let run_label = non_empty_or(
            report.run_label.as_deref().unwrap_or("").trim(),
            "unknown",
        );
        let error_type = non_empty_or(
            report.error_type.as_deref().unwrap_or("").trim(),
            "unknown",
        );

        // Step 3: stack trace, redacted and truncated.
        let stack_trace = report
            .stack_trace
            .as_deref()
            .map(|s| truncate_context_text(&redact(s), self.config.context_truncation_chars));

        // Step 4: duplicate guard.
        let guard = duplicate_guard(&source, &message, &error_type, stack_trace.as_deref());

        // Step 5: duplicate check.
        if self.duplicate_is_open_or_in_progress(&guard) {
            return Ok(None);
        }

        // Step 6: priority classification.
        let priority = report
            .priority
            .unwrap_or_else(|| classify_priority(&error_type, &message, &source));

        // Step 7: capture enabled?
        if !self.config.capture_enabled {
            return Ok(None);
        }

        // Step 8: throttle check.
        if self.throttler.check(priority, now_ms).is_err() {
            let _ = self.event_log.record(Event::new(
                "THROTTLED",
                EventLevel::Warning,
                format!("ticket creation throttled for priority {priority}"),
            ));
            return Ok(None);
        }

        // Step 9: context capture.
        let minimal_context = matches!(priority, Priority::P1);
        let file_context = if report.capture_context && !minimal_context {
            capture_file_context(&source)
        } else {
            HashMap::new()
        };
        let system_state = if report.capture_context && !minimal_context {
            sanitized_system_state()
        } else {
            HashMap::new()
        };

        // Step 10: assemble the ticket.
        let raw_suffix = self.id_gen.next();
        let suffix_len = 5.min(raw_suffix.len());
        let id = actifix_core::TicketId::new(format!(
            "ACT-{}-{}",
            ymd_from_ms(now_ms),
            raw_suffix[..suffix_len].to_uppercase()
        ));
        let ai_remediation_notes = build_remediation_notes(&error_type, &message, stack_trace.as_deref());

        let ticket = Ticket {
            id,
            duplicate_guard: guard.clone(),
            priority,
            error_type: error_type.clone(),
            message: redact(&message),
            source: source.clone(),
            run_label: run_label.to_string(),
            correlation_id: report.correlation_id.clone(),
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            format_version: 1,
            status: TicketStatus::Open,
            documented: false,
            functioning: false,
            tested: false,
            completed: false,
            locked_by: None,
            locked_at_ms: None,
            lease_expires_ms: None,
            owner: None,
            branch: None,
            stack_trace,
            file_context,
            system_state,
            ai_remediation_notes: Some(ai_remediation_notes),
            completion_summary: None,
        };

        // Step 11: persist, falling back to the queue on failure.
        match self.ticket_store.create_ticket(ticket.clone()) {
            Ok(true) => {
                let _ = self.throttler.record(priority, Some(ticket.id.as_str().to_string()), Some(error_type), now_ms);
                let _ = self.event_log.record(
                    Event::new("TICKET_CREATED", EventLevel::Info, format!("created {}", ticket.id))
                        .with_ticket(ticket.id.clone()),
                );
                self.replay_fallback_opportunistically();
                Ok(Some(ticket))
            }
            Ok(false) => Ok(None),
            Err(err) => {
                let content = serde_json::to_value(&ticket).unwrap_or(serde_json::Value::Null);
                let _ = self.fallback_queue.enqueue(
                    self.id_gen.next(),
                    FallbackOperation::Write,
                    &format!("ticket/{}", ticket.id),
                    content,
                    now_ms,
                    HashMap::new(),
                );
                let _ = self.event_log.record(Event::new(
                    "FALLBACK_QUEUE",
                    EventLevel::Error,
                    format!("ticket store write failed, queued: {err}"),
                ));
                Ok(Some(ticket))
            }
        }
    }

    fn duplicate_is_open_or_in_progress(&self, guard: &str) -> bool {
        self.ticket_store
            .get_tickets(&actifix_core::TicketFilter::default())
            .iter()
            .any(|t| {
                t.duplicate_guard == guard
                    && matches!(t.status, TicketStatus::Open | TicketStatus::InProgress)
            })
    }

    fn replay_fallback_opportunistically(&self) {
        let now_ms = self.clock.now_ms();
        let store = Arc::clone(&self.ticket_store);
        let _ = self.fallback_queue.replay(
            |entry| {
                let Ok(ticket) = serde_json::from_value::<Ticket>(entry.content.clone()) else {
                    return true;
                };
                store.create_ticket(ticket).unwrap_or(false)
            },
            5,
            now_ms,
        );
    }
}

/// Shared by the ingestion pipeline and every writable HTTP handler
/// (C13): when `enforce_raise_af` is set, the caller must have declared
/// `ACTIFIX_CHANGE_ORIGIN=raise_af` in its own environment.
pub fn check_origin_gate(config: &Config) -> Result<(), EngineError> {
    if config.enforce_raise_af && env::var("ACTIFIX_CHANGE_ORIGIN").as_deref() != Ok("raise_af") {
        return Err(EngineError::OriginGateRejected);
    }
    Ok(())
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

fn ymd_from_ms(now_ms: i64) -> String {
    let days = now_ms.div_euclid(86_400_000);
    let (y, m, d) = civil_from_days(days);
    format!("{y:04}{m:02}{d:02}")
}

/// Days-since-epoch to Gregorian civil date, Howard Hinnant's algorithm.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

/// Normalise free text for duplicate-guard comparison: collapse path-like
/// tokens and integers so the guard is insensitive to line numbers and
/// absolute paths.
fn normalize_for_guard(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let path_collapsed = PATH_RE.replace_all(text, "/PATH/");
    let digits_collapsed = DIGITS_RE.replace_all(&path_collapsed, "0");
    let lowered = digits_collapsed.to_lowercase();
    let trimmed = lowered.trim();
    trimmed.chars().take(200).collect()
}

fn stack_signature_for_guard(stack_trace: Option<&str>) -> String {
    let Some(trace) = stack_trace else {
        return String::new();
    };
    for line in trace.lines() {
        let cleaned = line.trim();
        if cleaned.is_empty() || cleaned.to_lowercase().starts_with("traceback") {
            continue;
        }
        return normalize_for_guard(cleaned);
    }
    String::new()
}

/// `(normalised_error_type, normalised_message, first-meaningful-stack-line)`
/// hashed to a short, message-focused duplicate guard.
pub fn duplicate_guard(_source: &str, message: &str, error_type: &str, stack_trace: Option<&str>) -> String {
    let normalized_message = normalize_for_guard(message);
    let normalized_error = normalize_for_guard(error_type);
    let stack_signature = stack_signature_for_guard(stack_trace);

    let guard_input = format!("{normalized_error}:{normalized_message}:{stack_signature}");
    let mut hasher = Sha256::new();
    hasher.update(guard_input.as_bytes());
    let digest = hasher.finalize();
    let hash_suffix: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();

    let message_slug: String = normalized_message.replace(' ', "-").chars().take(40).collect();
    let message_slug = if message_slug.is_empty() { "message".to_string() } else { message_slug };

    format!("ACTIFIX-{message_slug}-{hash_suffix}")
}

/// Truncate while preserving head and tail, matching the original's
/// `_truncate_context_text`.
pub fn truncate_context_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let marker = "\n... (truncated) ...\n";
    let available = max_chars.saturating_sub(marker.chars().count());
    let head_size = available / 2;
    let tail_size = available - head_size;

    let chars: Vec<char> = text.chars().collect();
    let head: String = chars.iter().take(head_size).collect();
    let tail: String = chars.iter().rev().take(tail_size).collect::<Vec<_>>().into_iter().rev().collect();

    let head = match head.rfind('\n') {
        Some(idx) if idx > 0 => head[..idx].to_string(),
        _ => head,
    };
    let tail = match tail.find('\n') {
        Some(idx) => tail[idx + 1..].to_string(),
        None => tail,
    };

    format!("{head}{marker}{tail}")
}

/// Head/tail snippet of the source file named in `source` (form
/// `path:line`), bounded to a small number of lines.
fn capture_file_context(source: &str) -> HashMap<String, String> {
    let mut context = HashMap::new();
    let path = source.split(':').next().unwrap_or(source);
    if path.is_empty() {
        return context;
    }
    if let Ok(content) = std::fs::read_to_string(path) {
        let snippet = truncate_context_text(&redact(&content), 2000);
        context.insert(path.to_string(), snippet);
    }
    context
}

/// Sanitised `cwd`/`ACTIFIX_*` environment snapshot for embedding in a
/// ticket's `system_state`.
fn sanitized_system_state() -> HashMap<String, String> {
    let mut state = actifix_core::config::sanitized_env_snapshot();
    if let Ok(cwd) = env::current_dir() {
        state.insert("cwd".to_string(), cwd.display().to_string());
    }
    state.insert("platform".to_string(), std::env::consts::OS.to_string());
    state
}

fn build_remediation_notes(error_type: &str, message: &str, stack_trace: Option<&str>) -> String {
    let stack_snippet = stack_trace.unwrap_or("(no stack trace captured)");
    format!(
        "Root Cause: {error_type}: {message}\nImpact: requires a code-level fix\nAction: investigate the stack trace below and apply a targeted fix\n\n{stack_snippet}"
    )
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
