//! Configuration for session coordination
//!
//! Controls drift tolerance, heartbeat cadence and command throttling.

use std::time::Duration;

use crate::error::{Result, SyncError};

/// Configuration for a [`SessionCoordinator`](crate::SessionCoordinator)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How far the local player may drift from the group target before a
    /// seek is issued
    /// Default: 1 second
    pub max_playback_drift: Duration,

    /// Interval between position updates sent by a spawned listener
    /// Default: 2 seconds
    pub position_update_interval: Duration,

    /// Window in which identical player commands are suppressed
    /// Default: 250 milliseconds
    pub throttle_window: Duration,

    /// How long a command applied to the player waits for its echo event
    /// Default: 1 second
    pub echo_ttl: Duration,

    /// Buffer size for group action and state change channels
    /// Default: 64
    pub event_buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_playback_drift: Duration::from_secs(1),
            position_update_interval: Duration::from_secs(2),
            throttle_window: Duration::from_millis(250),
            echo_ttl: Duration::from_secs(1),
            event_buffer_size: 64,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight sync for short clips and music
    pub fn strict() -> Self {
        Self {
            max_playback_drift: Duration::from_millis(250),
            position_update_interval: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Loose sync for long-form video on slow networks
    pub fn relaxed() -> Self {
        Self {
            max_playback_drift: Duration::from_secs(2),
            position_update_interval: Duration::from_secs(5),
            throttle_window: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.max_playback_drift.is_zero() {
            return Err(SyncError::Configuration(
                "Max playback drift must be greater than 0".to_string(),
            ));
        }

        if self.position_update_interval.is_zero() {
            return Err(SyncError::Configuration(
                "Position update interval must be greater than 0".to_string(),
            ));
        }

        if self.throttle_window >= self.position_update_interval {
            return Err(SyncError::Configuration(
                "Throttle window must be shorter than the position update interval".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(SyncError::Configuration(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
