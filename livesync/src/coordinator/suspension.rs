//! Suspensions: intentional, local divergence from the group

use std::collections::BTreeMap;
use std::sync::Weak;

use livesync_state::CoordinationWaitPoint;
use tracing::debug;

use super::SessionCoordinator;
use crate::error::{Result, SyncError};

/// How active suspensions constrain a reconciled target
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Hold {
    /// Apply the group target
    None,
    /// Apply nothing
    All,
    /// Pause at this position
    At(f64),
}

#[derive(Debug, Default)]
pub(super) struct SuspensionSet {
    next_id: u64,
    active: BTreeMap<u64, Option<CoordinationWaitPoint>>,
    pub(super) out_of_sync: bool,
    pub(super) needs_reconcile: bool,
}

impl SuspensionSet {
    pub(super) fn insert(&mut self, wait_point: Option<CoordinationWaitPoint>) -> u64 {
        self.next_id += 1;
        self.active.insert(self.next_id, wait_point);
        self.next_id
    }

    pub(super) fn remove(&mut self, id: u64) -> bool {
        let removed = self.active.remove(&id).is_some();
        if self.active.is_empty() {
            self.out_of_sync = false;
        }
        removed
    }

    pub(super) fn clear(&mut self) {
        self.active.clear();
        self.out_of_sync = false;
        self.needs_reconcile = false;
    }

    pub(super) fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub(super) fn has_wait_points(&self) -> bool {
        self.active.values().any(Option::is_some)
    }

    /// The hold for a group target position
    ///
    /// Any suspension without a wait point holds everything. Otherwise the
    /// lowest wait point whose window contains `target` wins.
    pub(super) fn hold_for(&self, target: f64) -> Hold {
        if self.active.is_empty() {
            return Hold::None;
        }
        if self.active.values().any(Option::is_none) {
            return Hold::All;
        }
        self.active
            .values()
            .flatten()
            .filter(|wp| wp.holds(target))
            .map(|wp| wp.position)
            .fold(None, |lowest: Option<f64>, p| {
                Some(lowest.map_or(p, |l| l.min(p)))
            })
            .map_or(Hold::None, Hold::At)
    }
}

/// Handle for an active suspension
///
/// While any suspension is active, incoming group state is recorded but not
/// forced onto the local player. [`Suspension::end`] resynchronizes to the
/// latest group state; dropping the handle releases the suspension and
/// resynchronization happens on the coordinator's next pass.
#[derive(Debug)]
pub struct Suspension {
    id: u64,
    wait_point: Option<CoordinationWaitPoint>,
    coordinator: Weak<SessionCoordinator>,
    active: bool,
}

impl Suspension {
    pub(super) fn new(
        id: u64,
        wait_point: Option<CoordinationWaitPoint>,
        coordinator: Weak<SessionCoordinator>,
    ) -> Self {
        Self {
            id,
            wait_point,
            coordinator,
            active: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn wait_point(&self) -> Option<CoordinationWaitPoint> {
        self.wait_point
    }

    /// End the suspension and reconcile to the latest group state
    pub async fn end(mut self) -> Result<()> {
        self.active = false;
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.end_suspension(self.id).await,
            None => Err(SyncError::Disposed),
        }
    }
}

impl Drop for Suspension {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(coordinator) = self.coordinator.upgrade() {
            debug!(suspension = self.id, "Suspension dropped without end()");
            coordinator.release_suspension(self.id);
        }
    }
}
