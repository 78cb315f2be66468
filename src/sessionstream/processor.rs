//! Session Window Processor
//!
//! The per-record driver: queries the store for overlapping sessions, runs
//! the merge, applies the grace-period admission policy, mutates the store,
//! and forwards change notifications downstream.
//!
//! ## Ownership Model
//!
//! One processor instance owns one partition. Partitions are disjoint key
//! spaces, so processors never contend; within a partition processing is
//! single-threaded and store calls block. The processor keeps no session
//! state between records beyond the stream-time watermark; the store owns
//! everything else, which is what makes the merge idempotent and tolerant of
//! out-of-order arrivals.
//!
//! ## Admission Policy
//!
//! Null-key records are dropped before the watermark is touched. Every
//! keyed record advances the watermark first and is then checked against the
//! close boundary `stream_time - grace - gap`; a merged window ending before
//! that boundary is dropped with the store left untouched.

use std::fmt;
use std::sync::Arc;

use crate::sessionstream::config::SessionWindowConfig;
use crate::sessionstream::forwarder::{ChangeSink, SessionChangeForwarder};
use crate::sessionstream::merger::SessionWindowMerger;
use crate::sessionstream::metrics::SessionMetrics;
use crate::sessionstream::store::{SessionStore, StoreError};
use crate::sessionstream::stream_time::StreamTimeTracker;
use crate::sessionstream::view::SessionView;
use crate::sessionstream::window::{SessionWindow, WindowedKey};

/// Positional metadata of the record being processed, supplied by the host
/// runtime for logging context.
#[derive(Debug, Clone, Copy)]
pub struct RecordMeta<'a> {
    /// Source topic of the record
    pub topic: &'a str,
    /// Source partition of the record
    pub partition: i32,
    /// Offset of the record within its partition
    pub offset: i64,
}

/// Why a record was dropped instead of applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The record arrived without a key
    NullKey,
    /// The merged window closed before the current close boundary
    WindowExpired,
}

/// Result of processing one record.
///
/// Drops are outcomes, not errors: they are counted and logged here and
/// never surface as failures to the caller. Only store failures escape as
/// `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome<K, Agg> {
    /// The record was dropped; the store is unchanged
    Dropped(DropReason),
    /// The record was folded into `session`
    Applied {
        /// The merged session that was written
        session: WindowedKey<K>,
        /// The aggregate written for the merged session
        aggregate: Agg,
        /// Sessions absorbed by the merge, replaced by `session`
        replaced: Vec<WindowedKey<K>>,
    },
}

/// Updates a key's aggregate with one new record value.
pub type Aggregator<K, V, Agg> = Box<dyn Fn(&K, &V, Agg) -> Agg + Send + Sync>;

/// Per-partition session window aggregation operator.
pub struct SessionWindowProcessor<K, V, Agg, S> {
    config: SessionWindowConfig,
    store: Arc<S>,
    aggregator: Aggregator<K, V, Agg>,
    merger: SessionWindowMerger<K, Agg>,
    stream_time: StreamTimeTracker,
    forwarder: SessionChangeForwarder<K, Agg>,
    metrics: Arc<SessionMetrics>,
}

impl<K, V, Agg, S> SessionWindowProcessor<K, V, Agg, S>
where
    K: Clone + fmt::Debug,
    V: fmt::Debug,
    Agg: Clone,
    S: SessionStore<K, Agg>,
{
    /// Create a processor for one partition.
    ///
    /// The three closures are the injected aggregate capabilities:
    /// `initializer` produces the zero aggregate, `aggregator` folds one
    /// record value in, and `merger` combines the aggregates of two sessions
    /// being merged. `merger` must be associative and commutative in effect
    /// over the sessions it combines, since store iteration order is
    /// unspecified.
    pub fn new(
        config: SessionWindowConfig,
        store: Arc<S>,
        initializer: impl Fn() -> Agg + Send + Sync + 'static,
        aggregator: impl Fn(&K, &V, Agg) -> Agg + Send + Sync + 'static,
        merger: impl Fn(&K, Agg, Agg) -> Agg + Send + Sync + 'static,
        sink: Box<dyn ChangeSink<K, Agg>>,
        metrics: Arc<SessionMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            aggregator: Box::new(aggregator),
            merger: SessionWindowMerger::new(initializer, merger),
            stream_time: StreamTimeTracker::new(),
            forwarder: SessionChangeForwarder::new(sink),
            metrics,
        }
    }

    /// Include replaced values in downstream deletion notifications.
    pub fn enable_old_values(&mut self) {
        self.forwarder.enable_old_values();
    }

    /// The operator's window configuration.
    pub fn config(&self) -> &SessionWindowConfig {
        &self.config
    }

    /// The partition's current stream time, or `None` before the first
    /// keyed record.
    pub fn observed_stream_time(&self) -> Option<i64> {
        self.stream_time.current()
    }

    /// A read-only point-lookup view sharing this processor's store.
    pub fn view(&self) -> SessionView<S> {
        SessionView::new(Arc::clone(&self.store))
    }

    /// Process one record.
    ///
    /// Returns `Ok(Dropped(..))` for null-key and expired-window records
    /// (counted and warn-logged, store untouched) and `Ok(Applied { .. })`
    /// once the merged session has been written and forwarded. Store
    /// failures propagate unmodified; this layer performs no retries.
    pub fn process(
        &mut self,
        key: Option<K>,
        value: V,
        timestamp: i64,
        meta: &RecordMeta<'_>,
    ) -> Result<ProcessOutcome<K, Agg>, StoreError> {
        self.metrics.record_processed();

        // A keyless record cannot address a session; it reveals nothing
        // about stream time either, so the watermark stays put.
        let Some(key) = key else {
            log::warn!(
                "Skipping record due to null key. value=[{:?}] topic=[{}] partition=[{}] offset=[{}]",
                value,
                meta.topic,
                meta.partition,
                meta.offset
            );
            self.metrics.record_dropped();
            return Ok(ProcessOutcome::Dropped(DropReason::NullKey));
        };

        let stream_time = self.stream_time.advance(timestamp);
        let close_time = self.config.close_time(stream_time);
        log::trace!(
            "Processing record key=[{:?}] timestamp=[{}] stream_time=[{}] close_time=[{}]",
            key,
            timestamp,
            stream_time,
            close_time
        );

        let gap = self.config.inactivity_gap_ms;
        let candidate = SessionWindow::at(timestamp);

        // The cursor is a scoped store resource; keep it inside this block
        // so it is released before any store mutation below.
        let merge = {
            let cursor = self.store.find_sessions(
                &key,
                timestamp.saturating_sub(gap),
                timestamp.saturating_add(gap),
            )?;
            self.merger.merge(&key, candidate, cursor)
        };

        if merge.window.end < close_time {
            log::warn!(
                "Skipping record for expired session window. key=[{:?}] topic=[{}] partition=[{}] \
                 offset=[{}] timestamp=[{}] window=[{},{}] expiration=[{}] stream_time=[{}]",
                key,
                meta.topic,
                meta.partition,
                meta.offset,
                timestamp,
                merge.window.start,
                merge.window.end,
                close_time,
                stream_time
            );
            self.metrics.record_dropped();
            return Ok(ProcessOutcome::Dropped(DropReason::WindowExpired));
        }

        let replaced: Vec<WindowedKey<K>> = merge
            .consumed
            .iter()
            .map(|(session, _)| session.clone())
            .collect();

        if merge.merged_any() {
            self.metrics.record_windows_merged(merge.consumed.len() as u64);
            log::debug!(
                "Merged {} session(s) for key=[{:?}] into window=[{},{}]",
                merge.consumed.len(),
                key,
                merge.window.start,
                merge.window.end
            );
        }

        // When the merged window equals the candidate, every consumed
        // session (if any) shares the exact windowed key the put below
        // overwrites, so the delete pass can be skipped.
        if merge.window != candidate {
            for (session, old_value) in merge.consumed {
                self.store.remove(&session)?;
                self.forwarder.maybe_forward(session, None, Some(old_value));
            }
        }

        let aggregate = (self.aggregator)(&key, &value, merge.aggregate);
        let session = WindowedKey::new(key, merge.window);
        self.store.put(session.clone(), aggregate.clone())?;
        self.forwarder
            .maybe_forward(session.clone(), Some(aggregate.clone()), None);

        Ok(ProcessOutcome::Applied {
            session,
            aggregate,
            replaced,
        })
    }
}

impl<K, V, Agg, S> fmt::Debug for SessionWindowProcessor<K, V, Agg, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionWindowProcessor")
            .field("config", &self.config)
            .field("stream_time", &self.stream_time)
            .finish_non_exhaustive()
    }
}
