//! Playback state enumeration

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport state of the group (or of the local client)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No track has been set yet, or the session was reset
    #[default]
    None,
    /// Position advances with the clock
    Playing,
    /// Held at a fixed position
    Paused,
    /// Reached the end of the track
    Ended,
    /// Local-only: the client has diverged through a suspension
    Suspended,
}

impl PlaybackState {
    /// Parse from the lowercase wire name
    ///
    /// Unknown values map to `None`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "playing" => PlaybackState::Playing,
            "paused" => PlaybackState::Paused,
            "ended" => PlaybackState::Ended,
            "suspended" => PlaybackState::Suspended,
            _ => PlaybackState::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlaybackState::None => "none",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Suspended => "suspended",
        }
    }

    pub fn is_playing(self) -> bool {
        self == PlaybackState::Playing
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
