//! livesync group state
//!
//! The data model and merge rules shared by every client of a synchronized
//! media session.
//!
//! # Features
//!
//! - **Group record**: [`GroupPlaybackState`] describes track, transport
//!   state and position relative to a session timestamp
//! - **Catch-up**: [`reconcile`] turns a (possibly late) record into the
//!   position the group is at *now*
//! - **Last-write-wins**: [`GroupStateStore`] merges concurrent writers by
//!   `(start_timestamp, change_owner_id)` and supports optimistic local
//!   writes with rollback
//! - **Reactive**: watch the current record with `tokio::sync::watch`
//!
//! # Quick Start
//!
//! ```rust
//! use livesync_state::{
//!     reconcile, ClientId, GroupPlaybackState, GroupStateStore, PlaybackState, Timestamp,
//! };
//!
//! let store = GroupStateStore::new();
//! store.apply_remote(
//!     GroupPlaybackState {
//!         playback_state: PlaybackState::Playing,
//!         position: 0.0,
//!         start_timestamp: Timestamp::from_millis(1_000),
//!         change_owner_id: Some(ClientId::from("client-a")),
//!         ..Default::default()
//!     },
//!     &ClientId::from("client-a"),
//! );
//!
//! let live = reconcile(&store.current(), Timestamp::from_millis(6_000));
//! assert_eq!(live.target_position, 5.0);
//! ```

pub mod model;
pub mod reconcile;
pub mod store;

pub use model::{
    roles_intersect, ClientId, ClientRoleInfo, CoordinationWaitPoint, GroupPlaybackState,
    PlaybackState, RoleId, Timestamp, TrackId, TrackInfo,
};
pub use reconcile::{reconcile, Reconciled};
pub use store::{ApplyOutcome, GroupStateStore, StateChange};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::model::{
        ClientId, CoordinationWaitPoint, GroupPlaybackState, PlaybackState, RoleId, Timestamp,
        TrackInfo,
    };
    pub use crate::reconcile::{reconcile, Reconciled};
    pub use crate::store::{ApplyOutcome, GroupStateStore, StateChange};
}
