//! Downstream Change Forwarding
//!
//! Every session insert and delete is surfaced to downstream consumers as a
//! [`SessionChange`] so derived state and the durability log stay
//! consistent. For a single input record, deletions of consumed sessions are
//! always emitted before the insertion of the merged result; downstream
//! observers never see a merged session coexist with a stale unmerged one.

use std::sync::Mutex;

use crate::sessionstream::window::WindowedKey;

/// A change notification for one session.
///
/// `new_value == None` marks a deletion; `old_value` is populated only when
/// old-value propagation is enabled on the forwarder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange<K, Agg> {
    /// The session the change applies to
    pub session: WindowedKey<K>,
    /// The session's new aggregate, or `None` for a deletion
    pub new_value: Option<Agg>,
    /// The replaced aggregate, when old-value propagation is enabled
    pub old_value: Option<Agg>,
}

/// Destination for forwarded changes.
///
/// The host wires this to its downstream topology and changelog; this crate
/// ships [`CollectingSink`] for tests and embedded use.
pub trait ChangeSink<K, Agg>: Send + Sync {
    /// Deliver one change event.
    fn emit(&self, change: SessionChange<K, Agg>);
}

/// Sink that buffers every change in memory, in emission order.
#[derive(Debug)]
pub struct CollectingSink<K, Agg> {
    changes: Mutex<Vec<SessionChange<K, Agg>>>,
}

impl<K, Agg> CollectingSink<K, Agg> {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            changes: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every change emitted so far, oldest first.
    pub fn changes(&self) -> Vec<SessionChange<K, Agg>>
    where
        K: Clone,
        Agg: Clone,
    {
        self.lock().clone()
    }

    /// Remove and return every buffered change.
    pub fn drain(&self) -> Vec<SessionChange<K, Agg>> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of buffered changes.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no changes are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SessionChange<K, Agg>>> {
        // A panicking emitter cannot corrupt a Vec of owned values; keep the
        // buffer usable rather than poisoning every later assertion.
        self.changes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<K, Agg> Default for CollectingSink<K, Agg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Agg> ChangeSink<K, Agg> for CollectingSink<K, Agg>
where
    K: Send + Sync,
    Agg: Send + Sync,
{
    fn emit(&self, change: SessionChange<K, Agg>) {
        self.lock().push(change);
    }
}

impl<K, Agg, T> ChangeSink<K, Agg> for std::sync::Arc<T>
where
    T: ChangeSink<K, Agg> + ?Sized,
{
    fn emit(&self, change: SessionChange<K, Agg>) {
        (**self).emit(change);
    }
}

/// Gates and delivers session changes to the downstream sink.
pub struct SessionChangeForwarder<K, Agg> {
    sink: Box<dyn ChangeSink<K, Agg>>,
    forward_old_values: bool,
}

impl<K, Agg> SessionChangeForwarder<K, Agg> {
    /// Create a forwarder with old-value propagation disabled.
    pub fn new(sink: Box<dyn ChangeSink<K, Agg>>) -> Self {
        Self {
            sink,
            forward_old_values: false,
        }
    }

    /// Include replaced values in deletion notifications from now on.
    pub fn enable_old_values(&mut self) {
        self.forward_old_values = true;
    }

    /// Whether old-value propagation is enabled.
    pub fn old_values_enabled(&self) -> bool {
        self.forward_old_values
    }

    /// Forward a change if it carries anything meaningful.
    ///
    /// With old-value propagation disabled, a deletion has no payload left
    /// to report and is suppressed entirely.
    pub fn maybe_forward(
        &self,
        session: WindowedKey<K>,
        new_value: Option<Agg>,
        old_value: Option<Agg>,
    ) {
        if new_value.is_none() && !self.forward_old_values {
            return;
        }
        self.sink.emit(SessionChange {
            session,
            new_value,
            old_value: if self.forward_old_values {
                old_value
            } else {
                None
            },
        });
    }
}

impl<K, Agg> std::fmt::Debug for SessionChangeForwarder<K, Agg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionChangeForwarder")
            .field("forward_old_values", &self.forward_old_values)
            .finish_non_exhaustive()
    }
}
