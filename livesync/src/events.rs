//! Group action events for the host UI
//!
//! Every command outcome, local or remote, produces one
//! [`GroupActionEvent`] so that the UI can give the same feedback no matter
//! who issued it.

use livesync_state::ClientId;

use crate::bus::TransportAction;
use crate::error::SyncError;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupAction {
    Play,
    Pause,
    SeekTo,
    SetTrack,
    EndOfTrack,
    /// The local player was moved to the group position
    Catchup,
    /// Bus connectivity changed
    Connection,
}

impl From<TransportAction> for GroupAction {
    fn from(action: TransportAction) -> Self {
        match action {
            TransportAction::Play => GroupAction::Play,
            TransportAction::Pause => GroupAction::Pause,
            TransportAction::SeekTo => GroupAction::SeekTo,
            TransportAction::SetTrack => GroupAction::SetTrack,
            TransportAction::EndOfTrack => GroupAction::EndOfTrack,
        }
    }
}

/// Who caused it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionSource {
    Local,
    Remote(ClientId),
}

impl ActionSource {
    pub fn is_local(&self) -> bool {
        matches!(self, ActionSource::Local)
    }
}

/// A `groupaction` notification
#[derive(Debug, Clone, PartialEq)]
pub struct GroupActionEvent {
    pub action: GroupAction,
    pub source: ActionSource,
    /// Set when the action failed or needed recovery
    pub error: Option<SyncError>,
}

impl GroupActionEvent {
    pub fn new(action: GroupAction, source: ActionSource) -> Self {
        Self {
            action,
            source,
            error: None,
        }
    }

    pub fn with_error(mut self, error: SyncError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
