//! Model types for livesync-state

mod client_id;
mod group_state;
mod playback_state;
mod timestamp;
mod track_info;
mod wait_point;

pub use client_id::{roles_intersect, ClientId, ClientRoleInfo, RoleId};
pub use group_state::GroupPlaybackState;
pub use playback_state::PlaybackState;
pub use timestamp::Timestamp;
pub use track_info::{TrackId, TrackInfo};
pub use wait_point::CoordinationWaitPoint;
