//! Session Aggregation Metrics
//!
//! Prometheus counters for the operator, registered against a caller-owned
//! `Registry`. The scrape endpoint and any remote-write plumbing belong to
//! the host; this module only owns the counters the operator increments.

use prometheus::{register_int_counter_with_registry, IntCounter, Opts, Registry};

/// Metrics construction failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    /// A counter could not be registered (typically a name collision).
    #[error("failed to register session metrics: {message}")]
    Registration { message: String },
}

/// Counter set for one session aggregation operator.
///
/// Shared between partitions of the same operator via `Arc`; prometheus
/// counters are internally thread-safe.
#[derive(Debug)]
pub struct SessionMetrics {
    dropped_records: IntCounter,
    records_processed: IntCounter,
    windows_merged: IntCounter,
}

impl SessionMetrics {
    /// Register the operator's counters against `registry`.
    pub fn new(registry: &Registry) -> Result<Self, MetricsError> {
        let dropped_records = register_int_counter_with_registry!(
            Opts::new(
                "session_dropped_records_total",
                "Records dropped for a null key or an expired session window"
            ),
            registry
        )
        .map_err(|e| MetricsError::Registration {
            message: format!("dropped-records counter: {}", e),
        })?;

        let records_processed = register_int_counter_with_registry!(
            Opts::new(
                "session_records_processed_total",
                "Records seen by the session aggregation operator"
            ),
            registry
        )
        .map_err(|e| MetricsError::Registration {
            message: format!("records-processed counter: {}", e),
        })?;

        let windows_merged = register_int_counter_with_registry!(
            Opts::new(
                "session_windows_merged_total",
                "Existing sessions absorbed into a merged session window"
            ),
            registry
        )
        .map_err(|e| MetricsError::Registration {
            message: format!("windows-merged counter: {}", e),
        })?;

        Ok(Self {
            dropped_records,
            records_processed,
            windows_merged,
        })
    }

    /// Count one dropped record.
    pub fn record_dropped(&self) {
        self.dropped_records.inc();
    }

    /// Count one processed record.
    pub fn record_processed(&self) {
        self.records_processed.inc();
    }

    /// Count sessions absorbed by a merge.
    pub fn record_windows_merged(&self, count: u64) {
        self.windows_merged.inc_by(count);
    }

    /// Current dropped-record count.
    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.get()
    }

    /// Current processed-record count.
    pub fn records_processed(&self) -> u64 {
        self.records_processed.get()
    }

    /// Current merged-session count.
    pub fn windows_merged(&self) -> u64 {
        self.windows_merged.get()
    }
}
