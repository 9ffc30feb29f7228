// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C14: webhook fan-out for ticket lifecycle events.
//!
//! Grounded on the original `webhooks.py`'s safe-field whitelist, retry
//! schedule, and User-Agent string; structurally on `notify/desktop.rs`'s
//! fire-and-forget idiom (log and move on, never propagate to the
//! caller).

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = "Actifix-Webhook/1.0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RETRIES: u32 = 2;
const MAX_MESSAGE_LEN: usize = 1000;

const SAFE_FIELDS: &[&str] = &[
    "id",
    "ticket_id",
    "entry_id",
    "priority",
    "error_type",
    "message",
    "source",
    "run_label",
    "created_at",
    "updated_at",
    "status",
    "correlation_id",
];

/// Event kinds a webhook can be fired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    TicketCreated,
    TicketCompleted,
}

impl WebhookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::TicketCreated => "ticket.created",
            WebhookEvent::TicketCompleted => "ticket.completed",
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload {
    event: &'static str,
    timestamp: String,
    ticket: HashMap<String, serde_json::Value>,
}

/// Keep only the whitelisted fields, truncating `message` to
/// `MAX_MESSAGE_LEN` characters (ellipsis included in the budget, as
/// the original computes it: 997 kept chars + `"..."`).
pub fn sanitize_ticket_for_webhook(
    ticket: &HashMap<String, serde_json::Value>,
) -> HashMap<String, serde_json::Value> {
    let mut sanitized = HashMap::new();
    for field in SAFE_FIELDS {
        let Some(value) = ticket.get(*field) else {
            continue;
        };
        if *field == "message" {
            if let Some(s) = value.as_str() {
                if s.chars().count() > MAX_MESSAGE_LEN {
                    let truncated: String = s.chars().take(MAX_MESSAGE_LEN - 3).collect();
                    sanitized.insert(field.to_string(), serde_json::Value::String(format!("{truncated}...")));
                    continue;
                }
            }
        }
        sanitized.insert(field.to_string(), value.clone());
    }
    sanitized
}

/// One attempt's outcome, for callers that want to log it as an event.
#[derive(Debug, Clone)]
pub struct WebhookAttempt {
    pub url: String,
    pub attempt: u32,
    pub outcome: WebhookOutcome,
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Success { status: u16 },
    HttpError { status: u16 },
    RequestError { message: String },
}

/// POSTs ticket-lifecycle notifications to configured URLs. Failures
/// are recorded in the returned attempt log but never returned as an
/// error: a webhook subscriber being down must never block ticket
/// processing.
pub struct WebhookSender {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_timeout_and_retries(timeout: Duration, max_retries: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
            max_retries,
        }
    }

    /// Sends `event` for `ticket` to every URL in `urls`, returning a
    /// per-URL, per-attempt log (for event recording) and the count of
    /// URLs that ultimately succeeded.
    pub async fn send(
        &self,
        event: WebhookEvent,
        ticket: &HashMap<String, serde_json::Value>,
        urls: &[String],
        now_iso: &str,
    ) -> (usize, Vec<WebhookAttempt>) {
        if urls.is_empty() {
            return (0, Vec::new());
        }

        let sanitized = sanitize_ticket_for_webhook(ticket);
        let payload = WebhookPayload {
            event: event.as_str(),
            timestamp: now_iso.to_string(),
            ticket: sanitized,
        };

        let mut log = Vec::new();
        let mut success_count = 0;

        for url in urls {
            if self.send_one(url, &payload, &mut log).await {
                success_count += 1;
            }
        }

        (success_count, log)
    }

    async fn send_one(&self, url: &str, payload: &WebhookPayload, log: &mut Vec<WebhookAttempt>) -> bool {
        for attempt in 0..=self.max_retries {
            let result = self
                .client
                .post(url)
                .header("User-Agent", USER_AGENT)
                .timeout(self.timeout)
                .json(payload)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        log.push(WebhookAttempt {
                            url: url.to_string(),
                            attempt: attempt + 1,
                            outcome: WebhookOutcome::Success { status: status.as_u16() },
                        });
                        tracing::info!(%url, event = payload.event, attempt = attempt + 1, "webhook sent");
                        return true;
                    }
                    log.push(WebhookAttempt {
                        url: url.to_string(),
                        attempt: attempt + 1,
                        outcome: WebhookOutcome::HttpError { status: status.as_u16() },
                    });
                    tracing::warn!(%url, event = payload.event, %status, attempt = attempt + 1, "webhook non-2xx response");
                }
                Err(e) => {
                    log.push(WebhookAttempt {
                        url: url.to_string(),
                        attempt: attempt + 1,
                        outcome: WebhookOutcome::RequestError { message: e.to_string() },
                    });
                    tracing::warn!(%url, event = payload.event, error = %e, attempt = attempt + 1, "webhook request failed");
                }
            }

            if attempt < self.max_retries {
                let backoff_ms = (500.0 * 2f64.powi(attempt as i32)) as u64;
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
        false
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
