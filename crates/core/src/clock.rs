// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time source for the orchestrator.
//!
//! Everything the engine records — event and outcome timestamps, session
//! ages, reaction escalation windows — is epoch milliseconds, so the trait
//! is exactly that narrow. A fake implementation lets tests step time past
//! an `escalateAfter` window without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    fn epoch_ms(&self) -> u64;

    /// The current instant in the ISO-8601 UTC form written to the event
    /// and outcome logs.
    fn timestamp(&self) -> String {
        crate::event::format_timestamp(self.epoch_ms())
    }
}

/// Wall-clock time.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Test clock pinned to a fixed epoch and advanced manually.
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: Arc<AtomicU64>,
}

impl FakeClock {
    /// Starts at a fixed, arbitrary epoch so timestamps are reproducible.
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(AtomicU64::new(1_700_000_000_000)) }
    }

    /// Step time forward; clones share the underlying counter.
    pub fn advance(&self, duration: Duration) {
        self.epoch_ms.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Pin time to an exact value.
    pub fn set_epoch_ms(&self, ms: u64) {
        self.epoch_ms.store(ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        self.epoch_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
