//! Session Window Types
//!
//! A session window is a dynamically-sized, inclusive time interval that grows
//! as activity for its key continues and closes once the key goes quiet for
//! longer than the configured inactivity gap.
//!
//! ```text
//! Events:   [00:00, 00:02, 00:03,          00:10, 00:12]
//! Sessions: [00:00 ─────── 00:03]          [00:10 ── 00:12]   (gap = 5 min)
//! ```

use serde::{Deserialize, Serialize};

/// An inclusive event-time interval `[start, end]` in milliseconds since epoch.
///
/// Windows for the same key never overlap in the store: any overlap is merged
/// eagerly before a write, so a `(key, window)` pair uniquely addresses one
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionWindow {
    /// First event time covered by this session (milliseconds since epoch)
    pub start: i64,
    /// Last event time covered by this session (milliseconds since epoch)
    pub end: i64,
}

impl SessionWindow {
    /// Create a window from inclusive bounds.
    ///
    /// Callers must uphold `start <= end`; every constructor in this crate
    /// does, since windows only ever grow by taking min/max of valid bounds.
    pub fn new(start: i64, end: i64) -> Self {
        debug_assert!(start <= end, "session window start must not exceed end");
        Self { start, end }
    }

    /// The zero-length window of a single event.
    pub fn at(timestamp: i64) -> Self {
        Self {
            start: timestamp,
            end: timestamp,
        }
    }

    /// The envelope of two windows: earliest start to latest end.
    pub fn merge(&self, other: &SessionWindow) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Whether this window intersects the inclusive range
    /// `[earliest_end, latest_start]`.
    ///
    /// This is the store-side overlap test: a session matches a range scan
    /// when its end reaches at least `earliest_end` and its start does not
    /// pass `latest_start`.
    pub fn overlaps_range(&self, earliest_end: i64, latest_start: i64) -> bool {
        self.end >= earliest_end && self.start <= latest_start
    }

    /// Window span in milliseconds (zero for a single-event session).
    pub fn span_ms(&self) -> i64 {
        self.end - self.start
    }
}

/// The store's composite primary key: a record key qualified by the session
/// window holding its aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowedKey<K> {
    /// The record key the session belongs to
    pub key: K,
    /// The session window addressed by this key
    pub window: SessionWindow,
}

impl<K> WindowedKey<K> {
    /// Create a windowed key.
    pub fn new(key: K, window: SessionWindow) -> Self {
        Self { key, window }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_takes_envelope() {
        let a = SessionWindow::new(10, 20);
        let b = SessionWindow::new(15, 40);
        assert_eq!(a.merge(&b), SessionWindow::new(10, 40));
        assert_eq!(b.merge(&a), SessionWindow::new(10, 40));
    }

    #[test]
    fn test_merge_with_point_window() {
        let session = SessionWindow::new(100, 200);
        let event = SessionWindow::at(50);
        assert_eq!(session.merge(&event), SessionWindow::new(50, 200));
    }

    #[test]
    fn test_overlap_is_inclusive_at_both_bounds() {
        let window = SessionWindow::new(0, 0);

        // An event at t=5 with gap 5 scans [0, 10]: exactly-gap-away merges
        assert!(window.overlaps_range(0, 10));
        // An event at t=6 scans [1, 11]: one unit beyond the gap does not
        assert!(!window.overlaps_range(1, 11));
    }

    #[test]
    fn test_overlap_on_start_side() {
        let window = SessionWindow::new(10, 10);

        // Event at t=5, gap 5: scan [0, 10] touches the session start
        assert!(window.overlaps_range(0, 10));
        // Event at t=4, gap 5: scan [-1, 9] falls one short
        assert!(!window.overlaps_range(-1, 9));
    }

    #[test]
    fn test_point_window_span() {
        assert_eq!(SessionWindow::at(42).span_ms(), 0);
        assert_eq!(SessionWindow::new(10, 25).span_ms(), 15);
    }
}
