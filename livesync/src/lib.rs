//! livesync
//!
//! Keep independent media players converged on one logical transport state
//! (track, playing/paused, position) across the members of a real-time
//! session.
//!
//! # Features
//!
//! - **Late-join catch-up**: every client computes where the group is *now*
//!   from the last state and the session clock, not where it was when the
//!   state was sent
//! - **Last-write-wins**: any eligible member may issue commands at any
//!   time; concurrent writes resolve deterministically
//! - **Suspensions and wait points**: a client may diverge on purpose and
//!   resynchronize later
//! - **Throttled player commands**: overlapping updates do not make the
//!   player stutter
//! - **Autoplay recovery**: blocked `play()` calls are retried muted
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use livesync::prelude::*;
//!
//! # async fn demo(player: Arc<dyn MediaPlayer>) -> livesync::Result<()> {
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
//! let hub = MemoryHub::new(clock.clone());
//! let roster = Arc::new(StaticRoster::new("client-a", vec![RoleId::from("presenter")]));
//!
//! let coordinator = SessionCoordinator::builder(Arc::new(hub.connect("client-a")), clock, roster)
//!     .build()?;
//! coordinator.initialize(vec![RoleId::from("presenter")]).await?;
//! coordinator.spawn().await?;
//!
//! let sync = MediaSynchronizer::new(player, coordinator.clone());
//! sync.set_track(TrackInfo::new("intro").with_src("https://media.example/intro.mp4")).await?;
//! sync.play().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! player events ──► MediaSynchronizer ──► SessionCoordinator ──► EventBus
//!                         ▲                 │  GroupStateStore      │
//!                         │                 │  reconcile + plan     │
//!                         └── throttled ◄───┘ ◄─────────────────────┘
//!                             commands          remote group state
//! ```

pub mod bus;
pub mod clock;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod player;
pub mod roster;
pub mod subscription;
pub mod synchronizer;
pub mod throttle;

pub use bus::{BusNotice, BusSubscription, Envelope, EventBus, MemoryBus, MemoryHub, SessionMessage, TransportAction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{plan_commands, PlayerSnapshot, TransportCommand};
pub use config::SessionConfig;
pub use coordinator::{
    CoordinatorStatus, SessionCoordinator, SessionCoordinatorBuilder, Suspension, SyncStatus,
};
pub use error::{BusError, PlayerError, Result, SyncError};
pub use events::{ActionSource, GroupAction, GroupActionEvent};
pub use player::{MediaPlayer, PlayerEvent, TransportSink};
pub use roster::{Roster, RosterChange, StaticRoster};
pub use subscription::Subscription;
pub use synchronizer::MediaSynchronizer;
pub use throttle::{ActionThrottler, PassthroughThrottler, RepeatedActionThrottler, ThrottledAction};

pub use livesync_state::{
    reconcile, ClientId, ClientRoleInfo, CoordinationWaitPoint, GroupPlaybackState, PlaybackState,
    Reconciled, RoleId, Timestamp, TrackId, TrackInfo,
};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::bus::{EventBus, MemoryHub};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::SessionConfig;
    pub use crate::coordinator::{SessionCoordinator, Suspension};
    pub use crate::error::{Result, SyncError};
    pub use crate::events::{GroupAction, GroupActionEvent};
    pub use crate::player::{MediaPlayer, PlayerEvent};
    pub use crate::roster::{Roster, StaticRoster};
    pub use crate::synchronizer::MediaSynchronizer;
    pub use livesync_state::prelude::*;
}
