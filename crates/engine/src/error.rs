// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the ingestion, dispatch, throttle, and rate-limit
//! machinery.

use actifix_storage::{EventLogError, TicketStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    TicketStore(#[from] TicketStoreError),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
    #[error(transparent)]
    Ledger(#[from] actifix_storage::LedgerError),
    #[error(transparent)]
    FallbackQueue(#[from] actifix_storage::FallbackQueueError),
    #[error("throttled: {0}")]
    Throttled(#[from] ThrottleError),
    #[error("rate limited: {0}")]
    RateLimited(#[from] RateLimitError),
    #[error("origin gate: caller did not declare ACTIFIX_CHANGE_ORIGIN=raise_af")]
    OriginGateRejected,
}

/// Why `Throttler::check` refused a ticket creation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("priority {priority}: {count} creations exceed the {limit} per {window} cap")]
    PriorityCapExceeded {
        priority: &'static str,
        count: u32,
        limit: u32,
        window: &'static str,
    },
    #[error("emergency brake: {count} creations in the last {window_minutes}m exceed {threshold}")]
    EmergencyBrake {
        count: u32,
        threshold: u32,
        window_minutes: u32,
    },
}

/// Why `RateLimiter::check` refused a provider call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("provider {provider}: {count} calls exceed the {limit} per {window} cap")]
    WindowCapExceeded {
        provider: String,
        count: u32,
        limit: u32,
        window: &'static str,
    },
}
