// crates/ticket-bridge-core/src/runtime/clock.rs
// ============================================================================
// Module: Ticket Bridge Clocks
// Description: System and fixed implementations of the clock interface.
// Purpose: Keep webhook freshness checks deterministic under test.
// Dependencies: time
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads the wall clock. [`FixedClock`] returns a settable
//! instant so tests can pin webhook age precisely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use time::OffsetDateTime;

use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually controlled time source.
#[derive(Debug)]
pub struct FixedClock {
    /// Current instant.
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    /// Creates a clock pinned at `now`.
    #[must_use]
    pub const fn new(now: OffsetDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
