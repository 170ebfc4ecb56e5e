//! Media player capability
//!
//! Anything that can report its position, play, pause and load a source can
//! be synchronized. Hosts wrap their concrete player (a video element, an
//! audio engine, a remote renderer) in [`MediaPlayer`] and forward its
//! native events as [`PlayerEvent`]s.

use async_trait::async_trait;

use crate::command::{PlayerSnapshot, TransportCommand};
use crate::error::PlayerError;
use crate::events::ActionSource;

#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Position in seconds
    fn current_time(&self) -> f64;

    fn set_current_time(&self, seconds: f64);

    fn paused(&self) -> bool;

    /// Currently loaded source
    fn src(&self) -> Option<String>;

    /// Replace the source; the player starts paused at 0
    fn load(&self, src: &str);

    /// Start playback
    ///
    /// May be refused by an autoplay policy with [`PlayerError::NotAllowed`].
    async fn play(&self) -> Result<(), PlayerError>;

    fn pause(&self);

    fn muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            src: self.src(),
            current_time: self.current_time(),
            paused: self.paused(),
        }
    }
}

/// Native player events the synchronizer listens to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerEvent {
    Playing,
    Pause,
    Seeking { position: f64 },
    Ended,
    /// Buffering
    Waiting,
}

/// Receiver of planned player commands
///
/// Implemented by [`MediaSynchronizer`](crate::MediaSynchronizer); hosts
/// may bind their own sink to a coordinator instead.
#[async_trait]
pub trait TransportSink: Send + Sync {
    fn snapshot(&self) -> PlayerSnapshot;

    async fn apply(&self, command: TransportCommand, source: ActionSource);
}
