// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage layer for Actifix: durable WAL-backed stores and the
//! snapshot/checkpoint/migration machinery they share.

mod atomic;
mod checkpoint;
mod event_log;
mod fallback_queue;
mod ledger;
mod migration;
mod quarantine;
mod snapshot;
mod ticket_cleanup;
mod ticket_store;
mod wal;

pub use atomic::{atomic_write, atomic_write_bytes, AtomicWriteError};
pub use checkpoint::{
    load_snapshot, CheckpointError, CheckpointHandle, CheckpointResult, CheckpointWriter,
    Checkpointer, FsCheckpointWriter,
};
pub use event_log::{EventLog, EventLogError};
pub use fallback_queue::{FallbackQueue, FallbackQueueError, ReplayStats};
pub use ledger::{Ledger, LedgerError, Timestamped};
pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use quarantine::{get_quarantine_count, list_quarantine, quarantine_content, QuarantineEntry, QuarantineError};
pub use snapshot::{Snapshot, SnapshotError};
pub use ticket_cleanup::{cleanup_duplicate_tickets, TicketCleanupReport};
pub use ticket_store::{TicketIndex, TicketOp, TicketStats, TicketStore, TicketStoreError};
pub use wal::{Wal, WalEntry, WalError};
