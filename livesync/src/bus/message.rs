//! Wire messages exchanged between coordinators

use livesync_state::{ClientId, GroupPlaybackState, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Transport command carried by a [`SessionMessage::Transport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportAction {
    Play,
    Pause,
    SeekTo,
    SetTrack,
    EndOfTrack,
}

impl TransportAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportAction::Play => "play",
            TransportAction::Pause => "pause",
            TransportAction::SeekTo => "seekTo",
            TransportAction::SetTrack => "setTrack",
            TransportAction::EndOfTrack => "endOfTrack",
        }
    }
}

impl std::fmt::Display for TransportAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of one bus event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionMessage {
    /// A client joined and wants the current group state
    Joined,

    /// A member changed the group state
    Transport {
        action: TransportAction,
        state: GroupPlaybackState,
    },

    /// The sender's view of the group state, unchanged
    ///
    /// Sent in reply to `Joined` and periodically as a heartbeat.
    PositionUpdate { state: GroupPlaybackState },
}

impl SessionMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionMessage::Joined => "joined",
            SessionMessage::Transport { .. } => "transport",
            SessionMessage::PositionUpdate { .. } => "positionUpdate",
        }
    }

    pub fn state(&self) -> Option<&GroupPlaybackState> {
        match self {
            SessionMessage::Joined => None,
            SessionMessage::Transport { state, .. } | SessionMessage::PositionUpdate { state } => {
                Some(state)
            }
        }
    }
}

/// A message as delivered by the bus, stamped with sender and send time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub sender: ClientId,
    pub timestamp: Timestamp,
    pub message: SessionMessage,
}

impl Envelope {
    pub fn new(sender: ClientId, timestamp: Timestamp, message: SessionMessage) -> Self {
        Self {
            sender,
            timestamp,
            message,
        }
    }

    pub fn to_json(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesync_state::{PlaybackState, TrackInfo};

    #[test]
    fn test_transport_json_shape() {
        let envelope = Envelope::new(
            ClientId::from("client-a"),
            Timestamp::from_millis(1_000),
            SessionMessage::Transport {
                action: TransportAction::SeekTo,
                state: GroupPlaybackState {
                    track: Some(TrackInfo::new("intro").with_src("intro.mp4")),
                    playback_state: PlaybackState::Paused,
                    position: 30.0,
                    duration: Some(600.0),
                    start_timestamp: Timestamp::from_millis(1_000),
                    change_owner_id: Some(ClientId::from("client-a")),
                },
            },
        );

        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(json["sender"], "client-a");
        assert_eq!(json["message"]["type"], "transport");
        assert_eq!(json["message"]["action"], "seekTo");
        assert_eq!(json["message"]["state"]["position"], 30.0);
    }

    #[test]
    fn test_decode_joined() {
        let json = r#"{"sender":"client-b","timestamp":5000,"message":{"type":"joined"}}"#;
        let envelope = Envelope::from_json(json).unwrap();
        assert_eq!(envelope.message, SessionMessage::Joined);
        assert_eq!(envelope.timestamp, Timestamp::from_millis(5_000));
        assert!(envelope.message.state().is_none());
    }

    #[test]
    fn test_unknown_message_type_is_codec_error() {
        let json = r#"{"sender":"client-b","timestamp":1,"message":{"type":"ink"}}"#;
        assert!(matches!(Envelope::from_json(json), Err(BusError::Codec(_))));
    }
}
