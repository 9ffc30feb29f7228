// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires `actifix-engine`'s durable `RateLimiter` into
//! `actifix-adapters::ai::RateLimitGate`, and bridges the dispatcher's
//! synchronous `FixHandler` call to the AI client's async
//! `generate_fix`.
//!
//! Grounded on `actifix-adapters::ai::NoRateLimit` for the gate shape
//! and on `dispatch.rs`'s `FixHandler` trait for the handler side; the
//! original `ai_client.py` is itself called synchronously from a worker
//! thread, so `tokio::task::block_in_place` here plays the same role as
//! that thread boundary.

use std::sync::Arc;

use actifix_adapters::ai::{AiClient, FixRequest, ProviderSelection, RateLimitGate};
use actifix_core::Ticket;
use actifix_engine::{DispatchOutcome, FixHandler, RateLimiter};

/// Adapts `actifix_engine::RateLimiter`'s fallible, ledger-backed
/// checks to the adapters crate's `Result<_, String>` / infallible
/// `record` shape.
pub struct LedgerRateLimitGate {
    limiter: Arc<RateLimiter>,
}

impl LedgerRateLimitGate {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl RateLimitGate for LedgerRateLimitGate {
    fn check(&self, provider: &str, now_ms: i64) -> Result<(), String> {
        self.limiter.check(provider, now_ms).map_err(|e| e.to_string())
    }

    fn record(
        &self,
        provider: &str,
        success: bool,
        tokens_used: Option<u64>,
        cost_usd: Option<f64>,
        error: Option<String>,
        now_ms: i64,
    ) {
        if let Err(e) = self
            .limiter
            .record(provider, success, tokens_used, cost_usd, error, now_ms)
        {
            tracing::warn!(error = %e, provider, "failed to record AI rate-limit usage");
        }
    }
}

/// Bridges the dispatcher's synchronous `FixHandler::handle` to the
/// async `AiClient::generate_fix`.
pub struct AiFixHandler {
    client: AiClient,
    selection: ProviderSelection,
    max_retries: u32,
}

impl AiFixHandler {
    pub fn new(client: AiClient, selection: ProviderSelection, max_retries: u32) -> Self {
        Self {
            client,
            selection,
            max_retries,
        }
    }
}

fn fix_request_for(ticket: &Ticket) -> FixRequest {
    FixRequest {
        id: ticket.id.as_str().to_string(),
        priority: ticket.priority.as_str().to_string(),
        error_type: ticket.error_type.clone(),
        message: ticket.message.clone(),
        source: ticket.source.clone(),
        stack_trace: ticket.stack_trace.clone(),
    }
}

impl FixHandler for AiFixHandler {
    fn handle(&self, ticket: &Ticket) -> DispatchOutcome {
        let request = fix_request_for(ticket);
        let now_ms = chrono::Utc::now().timestamp_millis();

        let response = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(
                self.client
                    .generate_fix(&request, &self.selection, self.max_retries, now_ms),
            )
        });

        DispatchOutcome {
            accepted: response.success,
            summary: if response.success {
                Some(response.content)
            } else {
                response.error
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actifix_adapters::ai::NoRateLimit;
    use actifix_core::{Priority, TicketId, TicketStatus};
    use std::collections::HashMap;

    fn sample_ticket() -> Ticket {
        Ticket {
            id: TicketId::new("ACT-20260101-abcde"),
            duplicate_guard: "guard".to_string(),
            priority: Priority::P2,
            error_type: "ValueError".to_string(),
            message: "boom".to_string(),
            source: "worker.py:10".to_string(),
            run_label: String::new(),
            correlation_id: None,
            created_at_ms: 0,
            updated_at_ms: 0,
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
            stack_trace: None,
            file_context: HashMap::new(),
            system_state: HashMap::new(),
            ai_remediation_notes: None,
            completion_summary: None,
        }
    }

    #[test]
    fn fix_request_carries_ticket_fields() {
        let ticket = sample_ticket();
        let request = fix_request_for(&ticket);
        assert_eq!(request.id, "ACT-20260101-abcde");
        assert_eq!(request.error_type, "ValueError");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn handler_falls_back_to_free_alternative_without_network() {
        let client = AiClient::new(Vec::new(), Box::new(NoRateLimit));
        let selection = actifix_adapters::ai::resolve_provider_selection(None, None);
        let handler = AiFixHandler::new(client, selection, 1);
        let ticket = sample_ticket();
        let outcome = handler.handle(&ticket);
        assert!(!outcome.accepted);
    }
}
