// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Actifix daemon (`actifixd`): owns the durable stores, runs the
//! ticket dispatch loop against the AI provider chain, and serves the
//! HTTP API (C13) that `ACTIFIX_API_BASE_URL`-configured `raise_af`
//! callers and the CLI both talk to.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod ai_bridge;
pub mod http;
pub mod lifecycle;
pub mod module_registry;

pub use ai_bridge::{AiFixHandler, LedgerRateLimitGate};
pub use lifecycle::{AppState, LifecycleError, StartupResult};
pub use module_registry::{DaemonModule, ModuleRegistry, ModuleStatus};
