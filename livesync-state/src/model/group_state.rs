//! The shared group playback record

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::{ClientId, PlaybackState, Timestamp, TrackInfo};

/// What the whole session's media should currently be doing
///
/// `position` is relative to `start_timestamp`: while playing, the live
/// position is `position + (now - start_timestamp)`. See
/// [`crate::reconcile::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPlaybackState {
    pub track: Option<TrackInfo>,
    pub playback_state: PlaybackState,
    /// Seconds into the track at `start_timestamp`
    pub position: f64,
    /// Track duration in seconds, if known
    pub duration: Option<f64>,
    pub start_timestamp: Timestamp,
    pub change_owner_id: Option<ClientId>,
}

impl GroupPlaybackState {
    /// The initial state before any track is set
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.playback_state == PlaybackState::None && self.track.is_none()
    }

    /// Last-write-wins ordering
    ///
    /// Later `start_timestamp` wins; equal timestamps fall back to the
    /// lexicographically higher `change_owner_id` (a missing owner sorts
    /// lowest).
    pub fn compare_version(&self, other: &Self) -> Ordering {
        self.start_timestamp
            .cmp(&other.start_timestamp)
            .then_with(|| self.change_owner_id.cmp(&other.change_owner_id))
    }

    /// Whether this state should replace `other`
    pub fn supersedes(&self, other: &Self) -> bool {
        self.compare_version(other) == Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(ts: u64, owner: Option<&str>) -> GroupPlaybackState {
        GroupPlaybackState {
            playback_state: PlaybackState::Paused,
            start_timestamp: Timestamp::from_millis(ts),
            change_owner_id: owner.map(ClientId::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_none_state() {
        let state = GroupPlaybackState::none();
        assert!(state.is_none());
        assert_eq!(state.position, 0.0);
    }

    #[test]
    fn test_later_timestamp_wins() {
        let older = state_at(100, Some("client-z"));
        let newer = state_at(200, Some("client-a"));
        assert!(newer.supersedes(&older));
        assert!(!older.supersedes(&newer));
    }

    #[test]
    fn test_equal_timestamp_tie_break_on_owner() {
        let a = state_at(100, Some("client-a"));
        let b = state_at(100, Some("client-b"));
        assert!(b.supersedes(&a));
        assert!(!a.supersedes(&b));
    }

    #[test]
    fn test_identical_version_does_not_supersede() {
        let a = state_at(100, Some("client-a"));
        assert!(!a.supersedes(&a.clone()));
    }

    #[test]
    fn test_missing_owner_sorts_lowest() {
        let anonymous = state_at(100, None);
        let owned = state_at(100, Some("client-a"));
        assert!(owned.supersedes(&anonymous));
    }

    #[test]
    fn test_json_shape() {
        let state = GroupPlaybackState {
            track: Some(TrackInfo::new("intro").with_duration(600.0)),
            playback_state: PlaybackState::Playing,
            position: 12.5,
            duration: Some(600.0),
            start_timestamp: Timestamp::from_millis(42),
            change_owner_id: Some(ClientId::from("client-a")),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["playbackState"], "playing");
        assert_eq!(json["startTimestamp"], 42);
        assert_eq!(json["changeOwnerId"], "client-a");

        let decoded: GroupPlaybackState = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, state);
    }
}
