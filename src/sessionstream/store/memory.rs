//! In-Memory Session Store
//!
//! Reference [`SessionStore`] implementation backed by a two-level index:
//! - Outer: `HashMap<K, SessionIndex>` for O(1) key lookup
//! - Inner: `BTreeMap<(start, end), Agg>` for O(log n) range scans
//!
//! Sessions for one key never overlap (the operator merges eagerly before
//! every write), so `(start, end)` uniquely addresses a session and the
//! BTreeMap order doubles as start-time order.
//!
//! The store is the in-process stand-in for a persistent range-queryable
//! engine: tests run against it, and embedded deployments can use it
//! directly. It tracks open cursors so the release-on-every-exit-path
//! contract of [`SessionCursor`] is observable.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::sessionstream::store::{SessionCursor, SessionStore, StoreError};
use crate::sessionstream::window::{SessionWindow, WindowedKey};

/// Sessions for a single key, ordered by window bounds.
type SessionIndex<Agg> = BTreeMap<(i64, i64), Agg>;

/// Counters for monitoring store activity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStoreStats {
    /// Total sessions written (lifetime)
    pub sessions_written: u64,
    /// Total sessions removed (lifetime)
    pub sessions_removed: u64,
    /// Total range scans performed
    pub range_scans: u64,
    /// Total sessions matched across all range scans
    pub sessions_matched: u64,
    /// Total point lookups performed
    pub point_lookups: u64,
    /// Current number of stored sessions
    pub current_sessions: usize,
    /// Current number of distinct keys
    pub current_keys: usize,
}

impl SessionStoreStats {
    fn record_put(&mut self, sessions: usize, keys: usize) {
        self.sessions_written += 1;
        self.current_sessions = sessions;
        self.current_keys = keys;
    }

    fn record_remove(&mut self, removed: bool, sessions: usize, keys: usize) {
        if removed {
            self.sessions_removed += 1;
        }
        self.current_sessions = sessions;
        self.current_keys = keys;
    }

    fn record_scan(&mut self, matches: usize) {
        self.range_scans += 1;
        self.sessions_matched += matches as u64;
    }
}

#[derive(Debug)]
struct StoreState<K, Agg> {
    sessions: HashMap<K, SessionIndex<Agg>>,
    session_count: usize,
    stats: SessionStoreStats,
}

/// In-memory range-queryable session store.
#[derive(Debug)]
pub struct InMemorySessionStore<K, Agg> {
    state: RwLock<StoreState<K, Agg>>,
    open_cursors: Arc<AtomicUsize>,
}

impl<K, Agg> InMemorySessionStore<K, Agg>
where
    K: Eq + Hash + Clone,
    Agg: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                sessions: HashMap::new(),
                session_count: 0,
                stats: SessionStoreStats::default(),
            }),
            open_cursors: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of range cursors currently alive.
    ///
    /// Returns to zero once every cursor handed out by `find_sessions` has
    /// been dropped; tests use this to verify release on all exit paths.
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.load(Ordering::SeqCst)
    }

    /// Total number of stored sessions across all keys (O(1)).
    pub fn session_count(&self) -> Result<usize, StoreError> {
        Ok(self.read_state()?.session_count)
    }

    /// Number of distinct keys with at least one session.
    pub fn key_count(&self) -> Result<usize, StoreError> {
        Ok(self.read_state()?.sessions.len())
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read_state()?.session_count == 0)
    }

    /// Current activity counters.
    pub fn stats(&self) -> Result<SessionStoreStats, StoreError> {
        Ok(self.read_state()?.stats.clone())
    }

    /// Every stored session, ordered by key-insertion-independent window
    /// bounds within each key.
    ///
    /// Intended for tests asserting store-state equality across drop paths.
    pub fn snapshot(&self) -> Result<Vec<(WindowedKey<K>, Agg)>, StoreError>
    where
        K: Ord,
    {
        let state = self.read_state()?;
        let mut entries: Vec<(WindowedKey<K>, Agg)> = state
            .sessions
            .iter()
            .flat_map(|(key, index)| {
                index.iter().map(move |(bounds, agg)| {
                    (
                        WindowedKey::new(key.clone(), SessionWindow::new(bounds.0, bounds.1)),
                        agg.clone(),
                    )
                })
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.0.key, a.0.window.start, a.0.window.end).cmp(&(
                &b.0.key,
                b.0.window.start,
                b.0.window.end,
            ))
        });
        Ok(entries)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState<K, Agg>>, StoreError> {
        self.state.read().map_err(|_| StoreError::Unavailable {
            reason: "session index lock poisoned".to_string(),
        })
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState<K, Agg>>, StoreError> {
        self.state.write().map_err(|_| StoreError::Unavailable {
            reason: "session index lock poisoned".to_string(),
        })
    }
}

impl<K, Agg> Default for InMemorySessionStore<K, Agg>
where
    K: Eq + Hash + Clone,
    Agg: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Agg> SessionStore<K, Agg> for InMemorySessionStore<K, Agg>
where
    K: Eq + Hash + Clone + Send + Sync,
    Agg: Clone + Send + Sync,
{
    fn find_sessions(
        &self,
        key: &K,
        earliest_end: i64,
        latest_start: i64,
    ) -> Result<SessionCursor<'_, K, Agg>, StoreError> {
        let matches: Vec<(WindowedKey<K>, Agg)> = {
            let mut state = self.write_state()?;
            let matches: Vec<(WindowedKey<K>, Agg)> = state
                .sessions
                .get(key)
                .map(|index| {
                    // Range to sessions starting at or before latest_start,
                    // then filter the end bound.
                    index
                        .range(..=(latest_start, i64::MAX))
                        .filter(|(bounds, _)| bounds.1 >= earliest_end)
                        .map(|(bounds, agg)| {
                            (
                                WindowedKey::new(
                                    key.clone(),
                                    SessionWindow::new(bounds.0, bounds.1),
                                ),
                                agg.clone(),
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            state.stats.record_scan(matches.len());
            matches
        };

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let open_cursors = Arc::clone(&self.open_cursors);
        Ok(SessionCursor::new(
            Box::new(matches.into_iter()),
            Box::new(move || {
                open_cursors.fetch_sub(1, Ordering::SeqCst);
            }),
        ))
    }

    fn put(&self, session: WindowedKey<K>, aggregate: Agg) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        let bounds = (session.window.start, session.window.end);
        let replaced = state
            .sessions
            .entry(session.key)
            .or_default()
            .insert(bounds, aggregate)
            .is_some();
        if !replaced {
            state.session_count += 1;
        }
        let (sessions, keys) = (state.session_count, state.sessions.len());
        state.stats.record_put(sessions, keys);
        Ok(())
    }

    fn remove(&self, session: &WindowedKey<K>) -> Result<(), StoreError> {
        let mut state = self.write_state()?;
        let bounds = (session.window.start, session.window.end);
        let mut removed = false;
        if let Some(index) = state.sessions.get_mut(&session.key) {
            removed = index.remove(&bounds).is_some();
            if index.is_empty() {
                state.sessions.remove(&session.key);
            }
        }
        if removed {
            state.session_count -= 1;
        }
        let (sessions, keys) = (state.session_count, state.sessions.len());
        state.stats.record_remove(removed, sessions, keys);
        Ok(())
    }

    fn fetch_session(&self, key: &K, start: i64, end: i64) -> Result<Option<Agg>, StoreError> {
        let mut state = self.write_state()?;
        state.stats.point_lookups += 1;
        Ok(state
            .sessions
            .get(key)
            .and_then(|index| index.get(&(start, end)))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed(key: &str, start: i64, end: i64) -> WindowedKey<String> {
        WindowedKey::new(key.to_string(), SessionWindow::new(start, end))
    }

    #[test]
    fn test_put_and_fetch_exact() {
        let store = InMemorySessionStore::new();
        store.put(windowed("k", 10, 20), 7i64).unwrap();

        assert_eq!(store.fetch_session(&"k".to_string(), 10, 20).unwrap(), Some(7));
        assert_eq!(store.fetch_session(&"k".to_string(), 10, 21).unwrap(), None);
        assert_eq!(store.fetch_session(&"x".to_string(), 10, 20).unwrap(), None);
    }

    #[test]
    fn test_put_replaces_exact_windowed_key() {
        let store = InMemorySessionStore::new();
        store.put(windowed("k", 10, 20), 1i64).unwrap();
        store.put(windowed("k", 10, 20), 2i64).unwrap();

        assert_eq!(store.session_count().unwrap(), 1);
        assert_eq!(store.fetch_session(&"k".to_string(), 10, 20).unwrap(), Some(2));
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let store = InMemorySessionStore::<String, i64>::new();
        store.remove(&windowed("k", 1, 2)).unwrap();
        assert!(store.is_empty().unwrap());
        assert_eq!(store.stats().unwrap().sessions_removed, 0);
    }

    #[test]
    fn test_find_sessions_inclusive_range() {
        let store = InMemorySessionStore::new();
        store.put(windowed("k", 0, 0), 1i64).unwrap();
        store.put(windowed("k", 10, 12), 2i64).unwrap();
        store.put(windowed("k", 50, 60), 3i64).unwrap();

        // Scan [0, 10]: touches [0,0] (end == 0) and [10,12] (start == 10)
        let found: Vec<_> = store
            .find_sessions(&"k".to_string(), 0, 10)
            .unwrap()
            .collect();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|(s, _)| s.window == SessionWindow::new(0, 0)));
        assert!(found.iter().any(|(s, _)| s.window == SessionWindow::new(10, 12)));
    }

    #[test]
    fn test_find_sessions_ignores_other_keys() {
        let store = InMemorySessionStore::new();
        store.put(windowed("a", 0, 5), 1i64).unwrap();
        store.put(windowed("b", 0, 5), 2i64).unwrap();

        let found: Vec<_> = store
            .find_sessions(&"a".to_string(), 0, 10)
            .unwrap()
            .collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, 1);
    }

    #[test]
    fn test_cursor_release_on_exhaustion_and_early_drop() {
        let store = InMemorySessionStore::new();
        store.put(windowed("k", 0, 5), 1i64).unwrap();
        store.put(windowed("k", 20, 25), 2i64).unwrap();

        let cursor = store.find_sessions(&"k".to_string(), 0, 30).unwrap();
        assert_eq!(store.open_cursors(), 1);
        let all: Vec<_> = cursor.collect();
        assert_eq!(all.len(), 2);
        assert_eq!(store.open_cursors(), 0);

        // Early drop without exhausting still releases
        let mut cursor = store.find_sessions(&"k".to_string(), 0, 30).unwrap();
        let _first = cursor.next();
        assert_eq!(store.open_cursors(), 1);
        drop(cursor);
        assert_eq!(store.open_cursors(), 0);
    }

    #[test]
    fn test_stats_track_activity() {
        let store = InMemorySessionStore::new();
        store.put(windowed("k", 0, 5), 1i64).unwrap();
        store.put(windowed("k", 20, 25), 2i64).unwrap();
        store.remove(&windowed("k", 0, 5)).unwrap();
        let _ = store
            .find_sessions(&"k".to_string(), 0, 30)
            .unwrap()
            .count();

        let stats = store.stats().unwrap();
        assert_eq!(stats.sessions_written, 2);
        assert_eq!(stats.sessions_removed, 1);
        assert_eq!(stats.range_scans, 1);
        assert_eq!(stats.sessions_matched, 1);
        assert_eq!(stats.current_sessions, 1);
        assert_eq!(stats.current_keys, 1);
    }

    #[test]
    fn test_snapshot_is_deterministic() {
        let store = InMemorySessionStore::new();
        store.put(windowed("b", 5, 9), 2i64).unwrap();
        store.put(windowed("a", 0, 4), 1i64).unwrap();
        store.put(windowed("a", 10, 14), 3i64).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(
            snapshot,
            vec![
                (windowed("a", 0, 4), 1),
                (windowed("a", 10, 14), 3),
                (windowed("b", 5, 9), 2),
            ]
        );
    }
}
