//! Session store: the client-side mirror of the remote session.
//!
//! Holds the last snapshot behind an `Arc`. Updates are copy-on-write: a
//! change clones the tree, patches one leaf and swaps in a new `Arc`, so a
//! consumer holding the previous snapshot keeps an unchanged value and can
//! detect updates with `Arc::ptr_eq`. Updates that change nothing keep the
//! same `Arc`.
//!
//! Deltas, acks and optimistic writes all go through the same leaf
//! replacement; the last write to a leaf wins.

use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use liveproto::{ApplyOutcome, LiveValue, Location, ParameterDelta, SessionSnapshot};
use tracing::{debug, trace};

#[derive(Debug, Default)]
pub struct SessionStore {
    snapshot: RwLock<Option<Arc<SessionSnapshot>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, or `None` before the first push / after disconnect.
    pub fn snapshot(&self) -> Option<Arc<SessionSnapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read one leaf by delta path.
    pub fn value(&self, path: &str) -> Option<LiveValue> {
        self.snapshot().and_then(|s| s.value(path))
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<SessionSnapshot>>> {
        self.snapshot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the snapshot unconditionally.
    pub fn set_snapshot(&self, snapshot: Arc<SessionSnapshot>) {
        debug!(
            "Session snapshot: {} tracks, {} parameters",
            snapshot.tracks.len(),
            snapshot.parameter_count()
        );
        *self.write() = Some(snapshot);
    }

    /// Forget the snapshot. Only explicit disconnect does this.
    pub fn clear(&self) {
        *self.write() = None;
    }

    /// Apply a bridge delta to the leaf its path addresses.
    pub fn apply_delta(&self, delta: &ParameterDelta) -> ApplyOutcome {
        let outcome = self.update(
            |s| s.locate_path(&delta.path),
            &delta.value,
            delta.display.as_deref(),
        );
        trace!("Delta {} = {} -> {:?}", delta.path, delta.value, outcome);
        outcome
    }

    /// Apply a confirmed value without touching the display string.
    pub fn apply_ack(&self, path: &str, value: &LiveValue) -> ApplyOutcome {
        self.update(|s| s.locate_path(path), value, None)
    }

    /// Write a local intent before the bridge confirms it.
    pub fn apply_optimistic(&self, entity: &str, property: &str, value: &LiveValue) -> ApplyOutcome {
        let outcome = self.update(|s| s.locate_property(entity, property), value, None);
        trace!("Optimistic {}.{} = {} -> {:?}", entity, property, value, outcome);
        outcome
    }

    /// Optimistic write addressed the way deltas are (`track0.vol`, a
    /// parameter path, ...).
    pub fn apply_optimistic_path(&self, path: &str, value: &LiveValue) -> ApplyOutcome {
        let outcome = self.update(|s| s.locate_path(path), value, None);
        trace!("Optimistic {} = {} -> {:?}", path, value, outcome);
        outcome
    }

    fn update<F>(&self, locate: F, value: &LiveValue, display: Option<&str>) -> ApplyOutcome
    where
        F: FnOnce(&SessionSnapshot) -> Result<Location, ApplyOutcome>,
    {
        let mut guard = self.write();
        let Some(current) = guard.as_ref() else {
            return ApplyOutcome::Unresolved;
        };

        let location = match locate(current) {
            Ok(location) => location,
            Err(outcome) => return outcome,
        };
        match current.check_update(location, value, display) {
            ApplyOutcome::Applied => {}
            other => return other,
        }

        let mut next = SessionSnapshot::clone(current);
        let outcome = next.write_at(location, value, display);
        if outcome.is_applied() {
            *guard = Some(Arc::new(next));
        }
        outcome
    }
}
