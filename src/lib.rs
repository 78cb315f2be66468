//! # sessionstream
//!
//! Per-key session window aggregation for continuous record streams:
//! groups an unbounded stream of (key, value, timestamp) records into
//! dynamically-sized, non-overlapping sessions per key, merges sessions
//! whose activity gaps are small enough, and emits an updated aggregate for
//! every affected session as records arrive.
//!
//! ## Features
//!
//! - **Gap-Based Session Merging**: sessions grow and merge eagerly so no
//!   two stored sessions for a key ever overlap
//! - **Late-Arrival Admission**: a monotonic stream-time watermark plus a
//!   configurable grace period decide when a window is permanently closed
//! - **Pluggable Aggregates**: initializer / aggregator / merger closures,
//!   order-tolerant given a commutative merger
//! - **Store As A Contract**: a range-queryable `SessionStore` trait with an
//!   in-memory reference implementation for tests and embedding
//! - **Change Forwarding**: delete-before-insert notifications keep
//!   downstream consumers and the changelog consistent
//!
//! ## Quick Start
//!
//! ```rust
//! use sessionstream::{
//!     CollectingSink, InMemorySessionStore, RecordMeta, SessionMetrics,
//!     SessionWindowConfig, SessionWindowProcessor,
//! };
//! use prometheus::Registry;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Registry::new();
//!     let metrics = Arc::new(SessionMetrics::new(&registry)?);
//!     let store = Arc::new(InMemorySessionStore::<String, i64>::new());
//!
//!     let mut processor = SessionWindowProcessor::new(
//!         SessionWindowConfig::with_gap_ms(5_000),
//!         Arc::clone(&store),
//!         || 0i64,
//!         |_key: &String, value: &i64, agg| agg + *value,
//!         |_key: &String, left, right| left + right,
//!         Box::new(CollectingSink::new()),
//!         metrics,
//!     );
//!
//!     let meta = RecordMeta { topic: "clicks", partition: 0, offset: 0 };
//!     processor.process(Some("user-1".to_string()), 1, 1_000, &meta)?;
//!     processor.process(Some("user-1".to_string()), 2, 3_000, &meta)?;
//!
//!     // Both events fall within the 5s gap: one session [1000, 3000] = 3
//!     assert_eq!(store.session_count()?, 1);
//!     Ok(())
//! }
//! ```

pub mod sessionstream;

// Re-export the main API at crate root for easy access
pub use sessionstream::{
    ChangeSink,
    CollectingSink,
    DropReason,
    InMemorySessionStore,
    MergeResult,
    // Errors
    MetricsError,
    ProcessOutcome,
    RecordMeta,
    SessionChange,
    SessionChangeForwarder,
    SessionCursor,
    SessionMetrics,
    // Store contract
    SessionStore,
    SessionStoreStats,
    SessionView,
    // Configuration
    SessionWindowConfig,
    SessionWindowMerger,
    // Core types
    SessionWindow,
    SessionWindowProcessor,
    StoreError,
    StreamTimeTracker,
    ValueAndTimestamp,
    WindowedKey,
};
