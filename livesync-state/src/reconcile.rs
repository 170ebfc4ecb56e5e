//! Catch-up computation
//!
//! A client that receives a group state late (or joins after it was
//! written) must compute where the group *is now*, not where it was when
//! the state was sent:
//!
//! ```text
//! elapsed        = max(now - start_timestamp, 0)
//! target         = playing ? position + elapsed : position
//! target > duration  =>  ended at duration
//! ```

use crate::model::{GroupPlaybackState, PlaybackState, Timestamp};

/// The live view of a group state at a given instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconciled {
    pub target_position: f64,
    pub playback_state: PlaybackState,
}

impl Reconciled {
    pub fn new(target_position: f64, playback_state: PlaybackState) -> Self {
        Self {
            target_position,
            playback_state,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state.is_playing()
    }
}

/// Compute the target position and effective state of `state` at `now`
///
/// Pure function of its inputs: reconciling the same state twice at the
/// same instant yields the same result.
pub fn reconcile(state: &GroupPlaybackState, now: Timestamp) -> Reconciled {
    let base = state.position.max(0.0);
    let target = if state.playback_state.is_playing() {
        base + now.seconds_since(state.start_timestamp)
    } else {
        base
    };

    match state.duration {
        Some(duration) if duration.is_finite() && target > duration => {
            Reconciled::new(duration, PlaybackState::Ended)
        }
        _ => Reconciled::new(target, state.playback_state),
    }
}
