// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! C8: per-provider AI rate limiting over three rolling windows
//! (minute, hour, day), individually configurable and disablable per
//! provider.
//!
//! Backed by `actifix_storage::Ledger<ApiCall>`, one ledger shared
//! across all providers since `count_since` takes a predicate.
//!
//! Grounded on `security/rate_limiter.py`'s `RateLimiter`.

use crate::error::RateLimitError;
use actifix_core::ApiCall;
use actifix_storage::{Ledger, LedgerError};
use std::collections::HashMap;
use std::path::Path;

const ONE_MINUTE_MS: i64 = 60_000;
const ONE_HOUR_MS: i64 = 3_600_000;
const ONE_DAY_MS: i64 = 24 * ONE_HOUR_MS;

/// Per-provider limit configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub calls_per_minute: u32,
    pub calls_per_hour: u32,
    pub calls_per_day: u32,
    pub enabled: bool,
}

/// Built-in conservative defaults, matching the original's `DEFAULT_LIMITS`.
pub fn default_limits() -> HashMap<String, RateLimitConfig> {
    let mut limits = HashMap::new();
    limits.insert(
        "openai".to_string(),
        RateLimitConfig {
            calls_per_minute: 3,
            calls_per_hour: 30,
            calls_per_day: 200,
            enabled: true,
        },
    );
    limits.insert(
        "claude_api".to_string(),
        RateLimitConfig {
            calls_per_minute: 5,
            calls_per_hour: 50,
            calls_per_day: 300,
            enabled: true,
        },
    );
    limits.insert(
        "claude_local".to_string(),
        RateLimitConfig {
            calls_per_minute: 10,
            calls_per_hour: 200,
            calls_per_day: 2000,
            enabled: false,
        },
    );
    limits.insert(
        "ollama".to_string(),
        RateLimitConfig {
            calls_per_minute: 10,
            calls_per_hour: 200,
            calls_per_day: 2000,
            enabled: false,
        },
    );
    limits
}

pub struct RateLimiter {
    ledger: Ledger<ApiCall>,
    limits: HashMap<String, RateLimitConfig>,
}

impl RateLimiter {
    pub fn open(wal_path: &Path, now_ms: i64) -> Result<Self, LedgerError> {
        Self::open_with_limits(wal_path, default_limits(), now_ms)
    }

    pub fn open_with_limits(
        wal_path: &Path,
        limits: HashMap<String, RateLimitConfig>,
        now_ms: i64,
    ) -> Result<Self, LedgerError> {
        let ledger = Ledger::open(wal_path, ONE_DAY_MS, now_ms)?;
        Ok(Self { ledger, limits })
    }

    /// Check minute, then hour, then day windows in order; the first
    /// breached window is the error returned.
    pub fn check(&self, provider: &str, now_ms: i64) -> Result<(), RateLimitError> {
        let Some(cfg) = self.limits.get(provider) else {
            return Ok(());
        };
        if !cfg.enabled {
            return Ok(());
        }

        self.check_window(provider, now_ms - ONE_MINUTE_MS, cfg.calls_per_minute, "minute")?;
        self.check_window(provider, now_ms - ONE_HOUR_MS, cfg.calls_per_hour, "hour")?;
        self.check_window(provider, now_ms - ONE_DAY_MS, cfg.calls_per_day, "day")?;
        Ok(())
    }

    fn check_window(
        &self,
        provider: &str,
        since_ms: i64,
        limit: u32,
        window: &'static str,
    ) -> Result<(), RateLimitError> {
        let count = self
            .ledger
            .count_since(since_ms, |c| c.provider == provider) as u32;
        if count >= limit {
            return Err(RateLimitError::WindowCapExceeded {
                provider: provider.to_string(),
                count,
                limit,
                window,
            });
        }
        Ok(())
    }

    pub fn record(
        &self,
        provider: &str,
        success: bool,
        tokens_used: Option<u64>,
        cost_usd: Option<f64>,
        error: Option<String>,
        now_ms: i64,
    ) -> Result<(), LedgerError> {
        self.ledger.record(ApiCall {
            provider: provider.to_string(),
            timestamp_ms: now_ms,
            success,
            tokens_used,
            cost_usd,
            error,
        })
    }

    pub fn checkpoint(&self) -> Result<(), LedgerError> {
        self.ledger.checkpoint()
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
