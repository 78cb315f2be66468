//! Session Window Merger
//!
//! Folds the set of existing sessions that overlap a new event into a single
//! merged window and combined aggregate. The fold is one linear pass in
//! store-defined order; the injected combine function is required to be
//! associative and commutative in effect, which makes the result independent
//! of that order.

use crate::sessionstream::window::{SessionWindow, WindowedKey};

/// Zero value producer for a fresh aggregate.
pub type Initializer<Agg> = Box<dyn Fn() -> Agg + Send + Sync>;

/// Combines the aggregates of two sessions being merged for a key.
pub type Merger<K, Agg> = Box<dyn Fn(&K, Agg, Agg) -> Agg + Send + Sync>;

/// Outcome of merging a candidate window with its overlapping sessions.
#[derive(Debug)]
pub struct MergeResult<K, Agg> {
    /// Envelope of the candidate and every consumed session
    pub window: SessionWindow,
    /// Combined aggregate of every consumed session, folded from the
    /// initializer's zero value (the new record is not yet applied)
    pub aggregate: Agg,
    /// Sessions absorbed by the merge, with their stored values, in the
    /// order the store returned them
    pub consumed: Vec<(WindowedKey<K>, Agg)>,
}

impl<K, Agg> MergeResult<K, Agg> {
    /// Whether any existing session was absorbed.
    pub fn merged_any(&self) -> bool {
        !self.consumed.is_empty()
    }
}

/// Stateless merge step shared by every record of a partition.
pub struct SessionWindowMerger<K, Agg> {
    initializer: Initializer<Agg>,
    merger: Merger<K, Agg>,
}

impl<K, Agg> SessionWindowMerger<K, Agg>
where
    Agg: Clone,
{
    /// Create a merger from the injected aggregate capabilities.
    pub fn new(
        initializer: impl Fn() -> Agg + Send + Sync + 'static,
        merger: impl Fn(&K, Agg, Agg) -> Agg + Send + Sync + 'static,
    ) -> Self {
        Self {
            initializer: Box::new(initializer),
            merger: Box::new(merger),
        }
    }

    /// Fold `overlapping` into `candidate`.
    ///
    /// With zero overlapping sessions the result window equals the candidate
    /// and the consumed set is empty, which lets the caller skip the delete
    /// pass entirely.
    pub fn merge(
        &self,
        key: &K,
        candidate: SessionWindow,
        overlapping: impl IntoIterator<Item = (WindowedKey<K>, Agg)>,
    ) -> MergeResult<K, Agg> {
        let mut window = candidate;
        let mut aggregate = (self.initializer)();
        let mut consumed = Vec::new();

        for (session, value) in overlapping {
            aggregate = (self.merger)(key, aggregate, value.clone());
            window = window.merge(&session.window);
            consumed.push((session, value));
        }

        MergeResult {
            window,
            aggregate,
            consumed,
        }
    }
}

impl<K, Agg> std::fmt::Debug for SessionWindowMerger<K, Agg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionWindowMerger").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum_merger() -> SessionWindowMerger<String, i64> {
        SessionWindowMerger::new(|| 0i64, |_key, a, b| a + b)
    }

    fn session(start: i64, end: i64, value: i64) -> (WindowedKey<String>, i64) {
        (
            WindowedKey::new("k".to_string(), SessionWindow::new(start, end)),
            value,
        )
    }

    #[test]
    fn test_no_overlap_keeps_candidate() {
        let merger = sum_merger();
        let result = merger.merge(&"k".to_string(), SessionWindow::at(100), Vec::new());

        assert_eq!(result.window, SessionWindow::at(100));
        assert_eq!(result.aggregate, 0);
        assert!(!result.merged_any());
    }

    #[test]
    fn test_fold_expands_window_and_combines() {
        let merger = sum_merger();
        let result = merger.merge(
            &"k".to_string(),
            SessionWindow::at(10),
            vec![session(0, 4, 3), session(12, 15, 5)],
        );

        assert_eq!(result.window, SessionWindow::new(0, 15));
        assert_eq!(result.aggregate, 8);
        assert_eq!(result.consumed.len(), 2);
    }

    #[test]
    fn test_fold_is_order_independent_for_commutative_merger() {
        let merger = sum_merger();
        let key = "k".to_string();
        let forward = merger.merge(
            &key,
            SessionWindow::at(10),
            vec![session(0, 4, 3), session(12, 15, 5)],
        );
        let reverse = merger.merge(
            &key,
            SessionWindow::at(10),
            vec![session(12, 15, 5), session(0, 4, 3)],
        );

        assert_eq!(forward.window, reverse.window);
        assert_eq!(forward.aggregate, reverse.aggregate);
    }

    #[test]
    fn test_consumed_preserves_stored_values() {
        let merger = sum_merger();
        let result = merger.merge(
            &"k".to_string(),
            SessionWindow::at(5),
            vec![session(0, 2, 9)],
        );

        assert_eq!(result.consumed, vec![session(0, 2, 9)]);
    }
}
