//! Wait points attached to suspensions

use serde::{Deserialize, Serialize};

/// A position at which a suspended client holds playback
///
/// The hold window is `[position, max_position]`; without a maximum it
/// extends to the end of the track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationWaitPoint {
    pub position: f64,
    pub max_position: Option<f64>,
}

impl CoordinationWaitPoint {
    pub fn new(position: f64) -> Self {
        Self {
            position,
            max_position: None,
        }
    }

    pub fn with_max_position(mut self, max_position: f64) -> Self {
        self.max_position = Some(max_position);
        self
    }

    /// Whether a group target position falls inside the hold window
    pub fn holds(&self, target: f64) -> bool {
        target >= self.position && self.max_position.map_or(true, |max| target <= max)
    }
}
