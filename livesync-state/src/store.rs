//! Group state store with optimistic local writes
//!
//! Holds the single authoritative [`GroupPlaybackState`] record for the
//! session. Local commands are written optimistically and later confirmed
//! or rolled back; remote states are merged with last-write-wins.
//!
//! # Architecture
//!
//! ```text
//! GroupStateStore
//! ├── inner: RwLock<StoreInner>
//! │   ├── current    (what the client acts on, may be optimistic)
//! │   ├── confirmed  (last state known to have reached the bus)
//! │   └── pending    (an optimistic local write is unconfirmed)
//! ├── current_tx: watch::Sender<GroupPlaybackState>
//! └── changes_tx: broadcast::Sender<StateChange>
//! ```

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};

use crate::model::{ClientId, GroupPlaybackState};

/// Represents a change to the stored group state
///
/// Emitted on every mutation. Subscribe via `store.subscribe_changes()`.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// An optimistic local write
    LocalWrite { state: GroupPlaybackState },
    /// A local write reached the bus
    Confirmed { state: GroupPlaybackState },
    /// A failed local write was reverted to the last confirmed state
    RolledBack { state: GroupPlaybackState },
    /// A remote state replaced the current one
    RemoteApplied {
        state: GroupPlaybackState,
        from: ClientId,
    },
    /// The underlying session was reset
    Reset,
}

/// Result of merging a remote state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The remote state superseded the current one
    Applied,
    /// The exact same state is already current
    Duplicate,
    /// The current state is newer
    Stale,
}

#[derive(Debug, Default)]
struct StoreInner {
    current: GroupPlaybackState,
    confirmed: GroupPlaybackState,
    pending: bool,
}

/// The session's group state record
pub struct GroupStateStore {
    inner: RwLock<StoreInner>,
    current_tx: watch::Sender<GroupPlaybackState>,
    changes_tx: broadcast::Sender<StateChange>,
}

impl GroupStateStore {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a store whose change channel buffers `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (current_tx, _rx) = watch::channel(GroupPlaybackState::none());
        let (changes_tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            inner: RwLock::new(StoreInner::default()),
            current_tx,
            changes_tx,
        }
    }

    /// The state the client currently acts on
    pub fn current(&self) -> GroupPlaybackState {
        self.inner.read().current.clone()
    }

    /// The last state known to have been delivered
    pub fn confirmed(&self) -> GroupPlaybackState {
        self.inner.read().confirmed.clone()
    }

    pub fn has_pending_write(&self) -> bool {
        self.inner.read().pending
    }

    /// Optimistically replace the current state with a local write
    pub fn write_local(&self, state: GroupPlaybackState) {
        {
            let mut inner = self.inner.write();
            inner.current = state.clone();
            inner.pending = true;
        }
        self.publish(StateChange::LocalWrite { state });
    }

    /// Mark a local write as delivered
    ///
    /// The write becomes the rollback target even if a later local write
    /// is already pending. Returns `false` if the write is no longer
    /// current.
    pub fn confirm_local(&self, state: &GroupPlaybackState) -> bool {
        let is_current = {
            let mut inner = self.inner.write();
            let advanced = state.supersedes(&inner.confirmed);
            if advanced {
                inner.confirmed = state.clone();
            }
            let is_current = inner.current == *state;
            if is_current {
                inner.pending = false;
            } else if !advanced {
                return false;
            }
            is_current
        };
        self.publish(StateChange::Confirmed {
            state: state.clone(),
        });
        is_current
    }

    /// Revert a failed local write to the last confirmed state
    ///
    /// Returns the restored state, or `None` if the write had already been
    /// superseded (in which case nothing changes).
    pub fn rollback_local(&self, state: &GroupPlaybackState) -> Option<GroupPlaybackState> {
        let restored = {
            let mut inner = self.inner.write();
            if inner.current != *state {
                return None;
            }
            inner.current = inner.confirmed.clone();
            inner.pending = false;
            inner.current.clone()
        };
        tracing::debug!(
            "Rolled back local write at {} to {}",
            state.start_timestamp,
            restored.start_timestamp
        );
        self.publish(StateChange::RolledBack {
            state: restored.clone(),
        });
        Some(restored)
    }

    /// Merge a state received from another client
    pub fn apply_remote(&self, state: GroupPlaybackState, from: &ClientId) -> ApplyOutcome {
        {
            let mut inner = self.inner.write();
            if inner.current == state {
                return ApplyOutcome::Duplicate;
            }
            if !state.supersedes(&inner.current) {
                if state.supersedes(&inner.confirmed) {
                    // Older than our pending write but still newer than what
                    // a rollback would restore.
                    inner.confirmed = state;
                }
                return ApplyOutcome::Stale;
            }
            inner.current = state.clone();
            inner.confirmed = state.clone();
            inner.pending = false;
        }
        self.publish(StateChange::RemoteApplied {
            state,
            from: from.clone(),
        });
        ApplyOutcome::Applied
    }

    /// Return to the `none` state
    pub fn reset(&self) {
        {
            let mut inner = self.inner.write();
            *inner = StoreInner::default();
        }
        self.publish(StateChange::Reset);
    }

    /// Watch the current state
    pub fn watch(&self) -> watch::Receiver<GroupPlaybackState> {
        self.current_tx.subscribe()
    }

    /// Subscribe to every mutation
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes_tx.subscribe()
    }

    fn publish(&self, change: StateChange) {
        let current = self.current();
        self.current_tx.send_if_modified(|value| {
            if *value != current {
                *value = current;
                true
            } else {
                false
            }
        });
        // No receivers is fine
        let _ = self.changes_tx.send(change);
    }
}

impl Default for GroupStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GroupStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("GroupStateStore")
            .field("current", &inner.current)
            .field("pending", &inner.pending)
            .finish()
    }
}
