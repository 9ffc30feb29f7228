// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event record (§3 "Event"). Events are never mutated;
//! pruning is by age only.

use crate::ticket::TicketId;
use serde::{Deserialize, Serialize};

/// Severity of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warning => "WARNING",
            EventLevel::Error => "ERROR",
            EventLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single append-only observation in the event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Assigned by the event log on append; 0 until persisted.
    #[serde(default)]
    pub id: u64,
    pub timestamp_ms: i64,
    /// Upper-snake identifier, e.g. `TICKET_CREATED`.
    pub event_type: String,
    pub level: EventLevel,
    pub message: String,
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub extra_json: Option<serde_json::Value>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp_ms: 0,
            event_type: event_type.into(),
            level,
            message: message.into(),
            ticket_id: None,
            correlation_id: None,
            source: None,
            extra_json: None,
        }
    }

    pub fn with_ticket(mut self, ticket_id: TicketId) -> Self {
        self.ticket_id = Some(ticket_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_extra(mut self, extra_json: serde_json::Value) -> Self {
        self.extra_json = Some(extra_json);
        self
    }
}

/// Filter criteria for `EventLog::get`.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_type: Option<String>,
    pub ticket_id: Option<TicketId>,
    pub correlation_id: Option<String>,
    pub level: Option<EventLevel>,
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_tracks_severity() {
        assert!(EventLevel::Debug < EventLevel::Info);
        assert!(EventLevel::Error < EventLevel::Critical);
    }

    #[test]
    fn builder_chains_set_optional_fields() {
        let e = Event::new("TICKET_CREATED", EventLevel::Info, "created")
            .with_ticket(TicketId::new("ACT-1"))
            .with_correlation_id("corr-1")
            .with_source("ingest");
        assert_eq!(e.ticket_id.unwrap().as_str(), "ACT-1");
        assert_eq!(e.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(e.source.as_deref(), Some("ingest"));
    }
}
