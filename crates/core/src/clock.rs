// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so task timestamps are deterministic in tests.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current UTC time.
///
/// All timestamp fields on [`crate::Task`] are stamped through a `Clock`
/// rather than calling `Utc::now()` directly, so that tests can pin time
/// and assert on exact values instead of ranges.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests. Starts at a fixed instant and advances
/// only when told to.
pub struct FakeClock {
    micros_since_epoch: AtomicI64,
}

impl FakeClock {
    /// Construct a fake clock pinned at the given time.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            micros_since_epoch: AtomicI64::new(
                at.timestamp() * 1_000_000 + i64::from(at.timestamp_subsec_micros()),
            ),
        }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: i64) {
        self.micros_since_epoch.fetch_add(ms * 1_000, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .expect("valid fixed timestamp")
                .with_timezone(&Utc),
        )
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp(micros / 1_000_000, ((micros % 1_000_000) * 1_000) as u32)
            .expect("fake clock value is always in range")
    }
}
