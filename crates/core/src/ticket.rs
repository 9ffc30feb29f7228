// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The ticket: Actifix's canonical error record.
//!
//! Field-for-field match of the documented data model. `Priority`'s
//! `Ord` impl follows declaration order (P0 highest), matching the
//! explicit ordinal map the ticket store uses for ordering — never
//! lexicographic.

use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_id! {
    /// Globally unique ticket identifier, form `ACT-YYYYMMDD-XXXXX`.
    pub struct TicketId;
}

/// Priority, ordered P0 (most urgent) through P4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
    P4,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::P0,
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::P4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
            Priority::P4 => "P4",
        }
    }

    /// Ordinal used for explicit priority-ascending sort (not lexicographic).
    pub fn ordinal(&self) -> u8 {
        match self {
            Priority::P0 => 0,
            Priority::P1 => 1,
            Priority::P2 => 2,
            Priority::P3 => 3,
            Priority::P4 => 4,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            "P3" => Ok(Priority::P3),
            "P4" => Ok(Priority::P4),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Work-state of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Open,
    InProgress,
    Completed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "Open",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known key under which the sanitised environment/system snapshot
/// is stored inside `Ticket::system_state`.
pub const SYSTEM_STATE_KEY: &str = "env";

/// Map of source path -> captured snippet, JSON-encoded in storage.
pub type FileContext = HashMap<String, String>;

/// Canonical error record. See spec §3 for the full invariant list;
/// those invariants are enforced by `actifix_storage::tickets::TicketStore`,
/// not by this struct's public API (which allows partial in-memory
/// construction before a ticket is persisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub duplicate_guard: String,

    pub priority: Priority,
    pub error_type: String,
    pub message: String,
    pub source: String,

    pub run_label: String,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    pub status: TicketStatus,
    #[serde(default)]
    pub documented: bool,
    #[serde(default)]
    pub functioning: bool,
    #[serde(default)]
    pub tested: bool,
    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub locked_at_ms: Option<i64>,
    #[serde(default)]
    pub lease_expires_ms: Option<i64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub stack_trace: Option<String>,
    #[serde(default)]
    pub file_context: FileContext,
    #[serde(default)]
    pub system_state: HashMap<String, String>,
    #[serde(default)]
    pub ai_remediation_notes: Option<String>,
    #[serde(default)]
    pub completion_summary: Option<String>,
}

fn default_format_version() -> u32 {
    1
}

impl Ticket {
    /// True if the four checklist flags are all set, the invariant
    /// required whenever `status == Completed`.
    pub fn checklist_complete(&self) -> bool {
        self.documented && self.functioning && self.tested && self.completed
    }

    /// True if the ticket is in a state a dispatcher may claim.
    pub fn is_claimable(&self) -> bool {
        matches!(self.status, TicketStatus::Open) && self.locked_by.is_none()
    }

    pub fn sla_hours_elapsed(&self, now_ms: i64) -> f64 {
        ((now_ms - self.created_at_ms).max(0) as f64) / (3_600_000.0)
    }
}

/// Filter criteria for `TicketStore::get_tickets`.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<Priority>,
    pub owner: Option<String>,
    pub locked: Option<bool>,
    pub created_after_ms: Option<i64>,
    pub created_before_ms: Option<i64>,
    pub correlation_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// Result of a successful lock acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketLock {
    pub ticket_id: TicketId,
    pub locked_by: String,
    pub locked_at_ms: i64,
    pub lease_expires_ms: i64,
}
