//! Materialized Session View
//!
//! Read-only point lookups over the session store for query and table-view
//! consumers. The view shares the store with the write path through an `Arc`
//! but never mutates it.

use std::sync::Arc;

use crate::sessionstream::store::{SessionStore, StoreError};
use crate::sessionstream::window::WindowedKey;

/// An aggregate paired with its associated event time.
///
/// For session windows the associated time is the window end: the latest
/// event the session has absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueAndTimestamp<Agg> {
    /// The stored aggregate
    pub value: Agg,
    /// Event time associated with the aggregate (milliseconds since epoch)
    pub timestamp: i64,
}

impl<Agg> ValueAndTimestamp<Agg> {
    /// Pair a value with its timestamp.
    pub fn new(value: Agg, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// Point-lookup adapter over a shared session store.
#[derive(Debug)]
pub struct SessionView<S> {
    store: Arc<S>,
}

impl<S> SessionView<S> {
    /// Create a view over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch the current aggregate of the exact session addressed by
    /// `session`, or `None` when no such session is materialized.
    pub fn get<K, Agg>(
        &self,
        session: &WindowedKey<K>,
    ) -> Result<Option<ValueAndTimestamp<Agg>>, StoreError>
    where
        S: SessionStore<K, Agg>,
    {
        let value =
            self.store
                .fetch_session(&session.key, session.window.start, session.window.end)?;
        Ok(value.map(|value| ValueAndTimestamp::new(value, session.window.end)))
    }
}
