//! Error types for livesync

use livesync_state::RoleId;
use thiserror::Error;

/// Errors surfaced by the coordinator and synchronizer
///
/// Initialization and authorization errors are returned before anything
/// is written. Bus failures are retryable; see [`SyncError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Session coordinator has not been initialized")]
    NotInitialized,

    #[error("Session coordinator is already initialized")]
    AlreadyInitialized,

    #[error("Local roles {roles:?} do not intersect eligible roles {eligible:?}")]
    NotAuthorized {
        roles: Vec<RoleId>,
        eligible: Vec<RoleId>,
    },

    #[error("Not connected to the session: {0}")]
    NotConnected(String),

    #[error("Playback rejected by player: {reason}")]
    PlaybackRejected { reason: String, recovered: bool },

    #[error("Coordinator or synchronizer has been disposed")]
    Disposed,

    #[error("Synchronizer is view-only")]
    ViewOnly,

    #[error("Invalid position: {0}")]
    InvalidPosition(f64),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Player error: {0}")]
    Player(#[from] PlayerError),
}

impl SyncError {
    /// Whether the caller may retry the command that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::NotConnected(_) | SyncError::Bus(BusError::Disconnected)
        )
    }
}

/// Failures reported by an [`EventBus`](crate::bus::EventBus)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Event bus is disconnected")]
    Disconnected,

    #[error("Event bus has been closed")]
    Closed,

    #[error("Failed to encode or decode message: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for BusError {
    fn from(err: serde_json::Error) -> Self {
        BusError::Codec(err.to_string())
    }
}

/// Failures reported by a [`MediaPlayer`](crate::player::MediaPlayer)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Autoplay policy refused `play()` without a user gesture
    #[error("Playback not allowed: {0}")]
    NotAllowed(String),

    #[error("Player failure: {0}")]
    Failed(String),
}

/// Result type for livesync operations
pub type Result<T> = std::result::Result<T, SyncError>;
