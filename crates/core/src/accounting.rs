// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider call accounting (§3 "APICall") and the ticket-creation
//! throttle ledger (§3 "TicketCreation"). Both are pruned at 24h by
//! their owning components (C7, C8).

use crate::ticket::Priority;
use serde::{Deserialize, Serialize};

/// A single AI-provider call, used by the rate limiter's rolling
/// windows and for cost/usage accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCall {
    pub provider: String,
    pub timestamp_ms: i64,
    pub success: bool,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub cost_usd: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A single ticket-creation event, used by the throttler's rolling
/// windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCreation {
    pub priority: Priority,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
}
