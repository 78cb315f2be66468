//! Session Window Configuration
//!
//! Two durations drive the operator: the inactivity gap that bounds how far
//! apart two events may be and still share a session, and the grace period
//! that keeps a window open for late out-of-order arrivals after stream time
//! has passed it.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for session window aggregation.
///
/// Both values are fixed for the operator's lifetime and must be
/// non-negative. Validation is the host's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindowConfig {
    /// Maximum idle time between events of one session, in milliseconds
    pub inactivity_gap_ms: i64,

    /// Additional allowance for late arrivals before a window is permanently
    /// closed, in milliseconds
    pub grace_period_ms: i64,
}

impl Default for SessionWindowConfig {
    fn default() -> Self {
        Self {
            inactivity_gap_ms: 30_000, // 30 second gap default
            grace_period_ms: 0,
        }
    }
}

impl SessionWindowConfig {
    /// Create a config from durations.
    ///
    /// # Panics
    /// Panics if either duration exceeds `i64::MAX` milliseconds
    /// (~292 million years).
    pub fn new(inactivity_gap: Duration, grace_period: Duration) -> Self {
        Self {
            inactivity_gap_ms: duration_to_ms(inactivity_gap, "inactivity gap"),
            grace_period_ms: duration_to_ms(grace_period, "grace period"),
        }
    }

    /// Create a config with the given gap and no grace period.
    pub fn with_gap_ms(inactivity_gap_ms: i64) -> Self {
        Self {
            inactivity_gap_ms,
            grace_period_ms: 0,
        }
    }

    /// Create a config with explicit gap and grace in milliseconds.
    pub fn with_gap_and_grace_ms(inactivity_gap_ms: i64, grace_period_ms: i64) -> Self {
        Self {
            inactivity_gap_ms,
            grace_period_ms,
        }
    }

    /// The close boundary for a given stream time.
    ///
    /// A merged window whose end falls before this boundary is permanently
    /// closed and the record that produced it is dropped.
    pub fn close_time(&self, stream_time: i64) -> i64 {
        stream_time
            .saturating_sub(self.grace_period_ms)
            .saturating_sub(self.inactivity_gap_ms)
    }
}

fn duration_to_ms(duration: Duration, what: &str) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or_else(|_| {
        panic!(
            "{} duration {} ms exceeds i64::MAX",
            what,
            duration.as_millis()
        )
    })
}
