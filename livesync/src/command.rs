//! Player commands and the planner that derives them
//!
//! The coordinator never pokes the player directly. It reconciles the group
//! state into a target, compares that with a snapshot of the player and
//! emits the minimal ordered list of [`TransportCommand`]s that closes the
//! gap.

use std::fmt;
use std::time::Duration;

use livesync_state::{PlaybackState, Reconciled, TrackInfo};

/// A single call on the local player
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    Load(TrackInfo),
    SeekTo(f64),
    Play,
    Pause,
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Load(_) => "load",
            TransportCommand::SeekTo(_) => "seekTo",
            TransportCommand::Play => "play",
            TransportCommand::Pause => "pause",
        }
    }

    /// Argument fingerprint used for duplicate detection
    ///
    /// Seek positions are quantized to 10 ms so that recomputed targets
    /// for the same instant compare equal.
    pub fn fingerprint(&self) -> String {
        match self {
            TransportCommand::Load(track) => match &track.src {
                Some(src) => format!("{}|{}", track.id, src),
                None => track.id.to_string(),
            },
            TransportCommand::SeekTo(position) => format!("{}", (position * 100.0).round() as i64),
            TransportCommand::Play | TransportCommand::Pause => String::new(),
        }
    }
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCommand::Load(track) => write!(f, "load({})", track.id),
            TransportCommand::SeekTo(position) => write!(f, "seekTo({:.3})", position),
            other => f.write_str(other.name()),
        }
    }
}

/// What the player is doing right now
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub src: Option<String>,
    pub current_time: f64,
    pub paused: bool,
}

/// Commands that move a player in `snapshot` to `target`
///
/// Order: load, pause, seek, play. Small drift below `max_drift` is left
/// alone.
pub fn plan_commands(
    target: &Reconciled,
    track: Option<&TrackInfo>,
    snapshot: &PlayerSnapshot,
    max_drift: Duration,
) -> Vec<TransportCommand> {
    let mut commands = Vec::new();
    if target.playback_state == PlaybackState::None {
        return commands;
    }

    let mut current_time = snapshot.current_time;
    let mut paused = snapshot.paused;

    if let Some(track) = track {
        if track.src.is_some() && track.src != snapshot.src {
            commands.push(TransportCommand::Load(track.clone()));
            current_time = 0.0;
            paused = true;
        }
    }

    let playing = target.is_playing();
    if !playing && !paused {
        commands.push(TransportCommand::Pause);
    }

    if (current_time - target.target_position).abs() > max_drift.as_secs_f64() {
        commands.push(TransportCommand::SeekTo(target.target_position));
    }

    if playing && paused {
        commands.push(TransportCommand::Play);
    }

    commands
}
