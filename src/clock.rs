// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic time helpers (§2 "Clock & Timer Service").
//!
//! The Store persists timestamps as epoch milliseconds so they survive a
//! restart; the phase controller schedules its waves with `tokio::time`
//! directly, same as the teacher's `spawn_health_checker` does for its
//! polling loop — no abstract timer-handle table is needed because any
//! in-memory handle is a cache the recovery sweep in §4.5 can rebuild.

use std::time::{SystemTime, UNIX_EPOCH};

/// Return current epoch millis.
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Convert a `Duration` to whole milliseconds added to now.
pub fn deadline_ms(ttl: std::time::Duration) -> u64 {
    epoch_ms() + ttl.as_millis() as u64
}
