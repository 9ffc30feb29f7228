// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn openai_minute_cap_trips_at_three_calls() {
    let dir = tempdir().unwrap();
    let rl = RateLimiter::open(&dir.path().join("r.wal"), 0).unwrap();
    for i in 0..3 {
        rl.record("openai", true, None, None, None, i * 10).unwrap();
    }
    assert!(matches!(
        rl.check("openai", 100),
        Err(RateLimitError::WindowCapExceeded { window: "minute", .. })
    ));
}

#[test]
fn disabled_provider_is_never_limited() {
    let dir = tempdir().unwrap();
    let rl = RateLimiter::open(&dir.path().join("r.wal"), 0).unwrap();
    for i in 0..500 {
        rl.record("claude_local", true, None, None, None, i).unwrap();
    }
    assert!(rl.check("claude_local", 1000).is_ok());
}

#[test]
fn unknown_provider_is_unbounded() {
    let dir = tempdir().unwrap();
    let rl = RateLimiter::open(&dir.path().join("r.wal"), 0).unwrap();
    assert!(rl.check("some_new_provider", 0).is_ok());
}

#[test]
fn hour_window_catches_what_minute_window_missed() {
    let dir = tempdir().unwrap();
    let mut limits = default_limits();
    limits.get_mut("claude_api").unwrap().calls_per_minute = 1000;
    limits.get_mut("claude_api").unwrap().calls_per_hour = 2;
    let rl = RateLimiter::open_with_limits(&dir.path().join("r.wal"), limits, 0).unwrap();
    rl.record("claude_api", true, None, None, None, 0).unwrap();
    rl.record("claude_api", true, None, None, None, ONE_MINUTE_MS * 2).unwrap();
    assert!(matches!(
        rl.check("claude_api", ONE_MINUTE_MS * 3),
        Err(RateLimitError::WindowCapExceeded { window: "hour", .. })
    ));
}

#[test]
fn day_window_resets_after_24h() {
    let dir = tempdir().unwrap();
    let mut limits = default_limits();
    limits.get_mut("claude_api").unwrap().calls_per_day = 1;
    let rl = RateLimiter::open_with_limits(&dir.path().join("r.wal"), limits, 0).unwrap();
    rl.record("claude_api", true, None, None, None, 0).unwrap();
    assert!(rl.check("claude_api", ONE_DAY_MS + 1000).is_ok());
}
