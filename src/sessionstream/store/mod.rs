//! Session Store Contract
//!
//! The operator persists all session state through this trait; it holds no
//! session state of its own between records. Implementations own every
//! persistence-format and durability decision.
//!
//! ## Range Scans
//!
//! `find_sessions` hands back a [`SessionCursor`], a scoped resource that
//! releases its underlying store resources (snapshots, locks) when dropped.
//! Dropping happens on every exit path of the caller, including early
//! returns and error propagation, so the release guarantee is structural
//! rather than convention.

pub mod memory;

pub use memory::{InMemorySessionStore, SessionStoreStats};

use crate::sessionstream::window::WindowedKey;

/// Errors surfaced by a session store.
///
/// Both variants are fatal to the current record: the operator performs no
/// retries and propagates them unmodified so the hosting runtime can restart
/// or reassign the affected partition.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store as a whole cannot serve requests.
    #[error("session store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A single store operation failed.
    #[error("session store {operation} failed ({context}): {reason}")]
    OperationFailed {
        /// Which operation failed (`find_sessions`, `put`, `remove`, `fetch_session`)
        operation: String,
        /// Key or range the operation targeted
        context: String,
        /// Store-specific failure description
        reason: String,
    },
}

/// Scoped iterator over the sessions matched by a range scan.
///
/// Iteration order is store-defined; callers must not rely on it. The set is
/// exhaustive and duplicate-free for the scanned range. A release hook, when
/// present, runs exactly once on drop.
pub struct SessionCursor<'a, K, Agg> {
    entries: Box<dyn Iterator<Item = (WindowedKey<K>, Agg)> + Send + 'a>,
    release: Option<Box<dyn FnOnce() + Send + 'a>>,
}

impl<'a, K, Agg> SessionCursor<'a, K, Agg> {
    /// Wrap a store-defined iterator with a release hook run on drop.
    pub fn new(
        entries: Box<dyn Iterator<Item = (WindowedKey<K>, Agg)> + Send + 'a>,
        release: Box<dyn FnOnce() + Send + 'a>,
    ) -> Self {
        Self {
            entries,
            release: Some(release),
        }
    }

    /// Wrap an already-materialized result set that needs no release step.
    pub fn from_entries(entries: Vec<(WindowedKey<K>, Agg)>) -> Self
    where
        K: Send + 'a,
        Agg: Send + 'a,
    {
        Self {
            entries: Box::new(entries.into_iter()),
            release: None,
        }
    }
}

impl<K, Agg> Iterator for SessionCursor<'_, K, Agg> {
    type Item = (WindowedKey<K>, Agg);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

impl<K, Agg> Drop for SessionCursor<'_, K, Agg> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<K, Agg> std::fmt::Debug for SessionCursor<'_, K, Agg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCursor")
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// Range-queryable per-key session storage.
///
/// Methods take `&self` so one store can be shared between the write path
/// and read-only views through an `Arc`; implementations use interior
/// mutability. Access is synchronous: the operator runs single-threaded per
/// partition and blocks on store calls.
pub trait SessionStore<K, Agg>: Send + Sync {
    /// All sessions for `key` whose window overlaps
    /// `[earliest_end, latest_start]`, both bounds inclusive.
    ///
    /// A session matches when `window.end >= earliest_end` and
    /// `window.start <= latest_start`.
    fn find_sessions(
        &self,
        key: &K,
        earliest_end: i64,
        latest_start: i64,
    ) -> Result<SessionCursor<'_, K, Agg>, StoreError>;

    /// Upsert a session, replacing any existing entry at that exact
    /// windowed key.
    fn put(&self, session: WindowedKey<K>, aggregate: Agg) -> Result<(), StoreError>;

    /// Delete a session if present; no-op otherwise.
    fn remove(&self, session: &WindowedKey<K>) -> Result<(), StoreError>;

    /// Exact-match point lookup by `(key, start, end)`.
    fn fetch_session(&self, key: &K, start: i64, end: i64) -> Result<Option<Agg>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessionstream::window::SessionWindow;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entries() -> Vec<(WindowedKey<String>, i64)> {
        vec![
            (
                WindowedKey::new("k".to_string(), SessionWindow::new(0, 4)),
                1,
            ),
            (
                WindowedKey::new("k".to_string(), SessionWindow::new(8, 9)),
                2,
            ),
        ]
    }

    #[test]
    fn test_cursor_yields_entries_in_order_given() {
        let values: Vec<i64> = SessionCursor::from_entries(entries())
            .map(|(_, value)| value)
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_release_hook_runs_exactly_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&released);
        let mut cursor = SessionCursor::new(
            Box::new(entries().into_iter()),
            Box::new(move || {
                hook.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let _ = cursor.next();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(cursor);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
