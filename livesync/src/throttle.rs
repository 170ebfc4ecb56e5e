//! Action throttling
//!
//! The coordinator re-asserts convergence aggressively: a join reply, a
//! heartbeat and a transport message for the same state may all arrive
//! within a few milliseconds. The throttler sits between the planner and
//! the player and drops repeats so the player does not stutter.

use std::time::Duration;

use livesync_state::Timestamp;
use parking_lot::Mutex;
use tracing::trace;

use crate::command::TransportCommand;

/// Pluggable throttling policy
pub trait ActionThrottler: Send + Sync {
    /// Returns `true` if `action` should be forwarded to the player
    fn send_action(&self, action: &TransportCommand, now: Timestamp) -> bool;

    /// Forget any suppression state
    fn reset(&self) {}
}

/// The last action forwarded to the player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottledAction {
    pub action_name: &'static str,
    pub fingerprint: String,
    pub last_sent_at: Timestamp,
}

/// Suppresses an identical action repeated within `window`
///
/// A different action always passes and replaces the record, which cancels
/// the previous action's window.
#[derive(Debug)]
pub struct RepeatedActionThrottler {
    window: Duration,
    last: Mutex<Option<ThrottledAction>>,
}

impl RepeatedActionThrottler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_action(&self) -> Option<ThrottledAction> {
        self.last.lock().clone()
    }
}

impl Default for RepeatedActionThrottler {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl ActionThrottler for RepeatedActionThrottler {
    fn send_action(&self, action: &TransportCommand, now: Timestamp) -> bool {
        let name = action.name();
        let fingerprint = action.fingerprint();
        let mut last = self.last.lock();

        if let Some(previous) = last.as_ref() {
            if previous.action_name == name
                && previous.fingerprint == fingerprint
                && now.saturating_duration_since(previous.last_sent_at) < self.window
            {
                trace!(action = %action, "Suppressed repeated action");
                return false;
            }
        }

        *last = Some(ThrottledAction {
            action_name: name,
            fingerprint,
            last_sent_at: now,
        });
        true
    }

    fn reset(&self) {
        *self.last.lock() = None;
    }
}

/// Forwards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughThrottler;

impl ActionThrottler for PassthroughThrottler {
    fn send_action(&self, _action: &TransportCommand, _now: Timestamp) -> bool {
        true
    }
}
