//! Session coordinator
//!
//! The coordinator is the per-client state machine that keeps the local
//! player converged on the group state. It turns local intents into new
//! group states, merges remote states with last-write-wins, and drives the
//! bound [`TransportSink`] through the planner and throttler.
//!
//! # Architecture
//!
//! ```text
//! SessionCoordinator
//! ├── bus: Arc<dyn EventBus>          broadcast / inbox of BusNotice
//! ├── clock: Arc<dyn Clock>           session time
//! ├── roster: Arc<dyn Roster>         local roles, sender roles
//! ├── store: GroupStateStore          optimistic + confirmed record
//! ├── suspensions: SuspensionSet      holds and wait points
//! ├── throttler: Arc<dyn ActionThrottler>
//! └── sink: Weak<dyn TransportSink>   usually a MediaSynchronizer
//! ```
//!
//! Incoming bus notices queue up in the inbox. Hosts drain it either with
//! [`SessionCoordinator::pump`] or by starting a background listener with
//! [`SessionCoordinator::spawn`].
//!
//! # States
//!
//! `uninitialized → initializing → idle ↔ playing ↔ paused → disposed`.
//! Suspension is orthogonal and reported by
//! [`SessionCoordinator::is_suspended`].

mod builder;
mod remote;
mod suspension;

pub use builder::SessionCoordinatorBuilder;
pub use suspension::Suspension;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use livesync_state::{
    reconcile, roles_intersect, ClientId, CoordinationWaitPoint, GroupPlaybackState,
    GroupStateStore, PlaybackState, Reconciled, RoleId, Timestamp, TrackInfo,
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use self::suspension::{Hold, SuspensionSet};
use crate::bus::{BusSubscription, EventBus, SessionMessage, TransportAction};
use crate::clock::Clock;
use crate::command::plan_commands;
use crate::config::SessionConfig;
use crate::error::{Result, SyncError};
use crate::events::{ActionSource, GroupAction, GroupActionEvent};
use crate::player::TransportSink;
use crate::roster::{Roster, RosterChange};
use crate::subscription::Subscription;
use crate::throttle::ActionThrottler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initializing,
    Active,
    Disposed,
}

/// Externally visible coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorStatus {
    Uninitialized,
    Initializing,
    /// Active, no track yet
    Idle,
    Playing,
    Paused,
    Ended,
    Disposed,
}

/// Where this client stands relative to the group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncStatus {
    pub suspended: bool,
    /// A suspension is keeping the player away from the group target
    pub out_of_sync: bool,
    /// Where the group is now, `None` before any track is set
    pub target_position: Option<f64>,
    /// A local write has not been acknowledged by the bus yet
    pub pending_write: bool,
}

/// Per-client playback coordinator
pub struct SessionCoordinator {
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    roster: Arc<dyn Roster>,
    config: SessionConfig,
    throttler: Arc<dyn ActionThrottler>,
    store: GroupStateStore,
    local_id: ClientId,
    lifecycle: RwLock<Lifecycle>,
    eligible_roles: RwLock<Vec<RoleId>>,
    authorized: Arc<AtomicBool>,
    inbox: tokio::sync::Mutex<Option<BusSubscription>>,
    roster_subscription: Mutex<Option<Subscription>>,
    suspensions: Mutex<SuspensionSet>,
    sink: RwLock<Option<Weak<dyn TransportSink>>>,
    actions_tx: broadcast::Sender<GroupActionEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCoordinator {
    pub fn builder(
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        roster: Arc<dyn Roster>,
    ) -> SessionCoordinatorBuilder {
        SessionCoordinatorBuilder::new(bus, clock, roster)
    }

    fn new(
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        roster: Arc<dyn Roster>,
        config: SessionConfig,
        throttler: Arc<dyn ActionThrottler>,
    ) -> Self {
        let (actions_tx, _rx) = broadcast::channel(config.event_buffer_size);
        let local_id = roster.local_client_id();
        Self {
            store: GroupStateStore::with_capacity(config.event_buffer_size),
            bus,
            clock,
            roster,
            config,
            throttler,
            local_id,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            eligible_roles: RwLock::new(Vec::new()),
            authorized: Arc::new(AtomicBool::new(true)),
            inbox: tokio::sync::Mutex::new(None),
            roster_subscription: Mutex::new(None),
            suspensions: Mutex::new(SuspensionSet::default()),
            sink: RwLock::new(None),
            actions_tx,
            listener: Mutex::new(None),
        }
    }

    /// Join the session
    ///
    /// `eligible_roles` gates who may issue transport commands; empty means
    /// everyone.
    pub async fn initialize(&self, eligible_roles: Vec<RoleId>) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.write();
            match *lifecycle {
                Lifecycle::Disposed => return Err(SyncError::Disposed),
                Lifecycle::Initializing | Lifecycle::Active => {
                    return Err(SyncError::AlreadyInitialized)
                }
                Lifecycle::Uninitialized => {}
            }
            if !self.bus.is_connected() {
                return Err(SyncError::NotConnected(
                    "session has not been joined".to_string(),
                ));
            }
            *lifecycle = Lifecycle::Initializing;
        }

        *self.eligible_roles.write() = eligible_roles.clone();
        self.authorized.store(
            roles_intersect(&self.roster.local_roles(), &eligible_roles),
            Ordering::Release,
        );
        *self.inbox.lock().await = Some(self.bus.subscribe());
        *self.roster_subscription.lock() = Some(self.watch_local_roles(eligible_roles));

        if let Err(e) = self.bus.broadcast(SessionMessage::Joined).await {
            warn!(client = %self.local_id, "Failed to announce join: {}", e);
            self.inbox.lock().await.take();
            self.roster_subscription.lock().take();
            self.set_lifecycle_if(Lifecycle::Initializing, Lifecycle::Uninitialized);
            return Err(SyncError::NotConnected(e.to_string()));
        }

        if !self.set_lifecycle_if(Lifecycle::Initializing, Lifecycle::Active) {
            return Err(SyncError::Disposed);
        }
        info!(client = %self.local_id, "Session coordinator initialized");
        Ok(())
    }

    fn watch_local_roles(&self, eligible: Vec<RoleId>) -> Subscription {
        let authorized = Arc::clone(&self.authorized);
        let local = self.local_id.clone();
        self.roster.on_roster_changed(Box::new(move |change| {
            if *change.client_id() != local {
                return;
            }
            let allowed = match change {
                RosterChange::Joined(info) | RosterChange::RolesChanged(info) => {
                    info.is_eligible(&eligible)
                }
                RosterChange::Left(_) => false,
            };
            debug!(client = %local, allowed, "Local roles changed");
            authorized.store(allowed, Ordering::Release);
        }))
    }

    fn set_lifecycle_if(&self, expected: Lifecycle, next: Lifecycle) -> bool {
        let mut lifecycle = self.lifecycle.write();
        if *lifecycle == expected {
            *lifecycle = next;
            true
        } else {
            false
        }
    }

    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    fn require_active(&self) -> Result<()> {
        match self.lifecycle() {
            Lifecycle::Active => Ok(()),
            Lifecycle::Disposed => Err(SyncError::Disposed),
            Lifecycle::Uninitialized | Lifecycle::Initializing => Err(SyncError::NotInitialized),
        }
    }

    fn authorize_local(&self, action: GroupAction) -> Result<()> {
        if self.authorized.load(Ordering::Acquire) {
            return Ok(());
        }
        let err = SyncError::NotAuthorized {
            roles: self.roster.local_roles(),
            eligible: self.eligible_roles.read().clone(),
        };
        warn!(client = %self.local_id, ?action, "Local command not authorized");
        self.emit(GroupActionEvent::new(action, ActionSource::Local).with_error(err.clone()));
        Err(err)
    }

    // Local intents

    pub async fn play(&self) -> Result<()> {
        self.commit_local(TransportAction::Play, |current, live, ts, owner| {
            let position = if live.playback_state == PlaybackState::Ended {
                0.0
            } else {
                live.target_position
            };
            Ok(GroupPlaybackState {
                playback_state: PlaybackState::Playing,
                position,
                start_timestamp: ts,
                change_owner_id: Some(owner),
                ..current.clone()
            })
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.commit_local(TransportAction::Pause, |current, live, ts, owner| {
            Ok(GroupPlaybackState {
                playback_state: PlaybackState::Paused,
                position: live.target_position,
                start_timestamp: ts,
                change_owner_id: Some(owner),
                ..current.clone()
            })
        })
        .await
    }

    /// Move the group to `position` seconds
    ///
    /// The position is clamped to the known duration. Playing groups keep
    /// playing; anything else ends up paused.
    pub async fn seek_to(&self, position: f64) -> Result<()> {
        self.require_active()?;
        if !position.is_finite() || position < 0.0 {
            return Err(SyncError::InvalidPosition(position));
        }
        self.commit_local(TransportAction::SeekTo, |current, live, ts, owner| {
            let position = match current.duration {
                Some(duration) if duration.is_finite() => position.min(duration),
                _ => position,
            };
            let playback_state = if live.playback_state == PlaybackState::Playing {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            };
            Ok(GroupPlaybackState {
                playback_state,
                position,
                start_timestamp: ts,
                change_owner_id: Some(owner),
                ..current.clone()
            })
        })
        .await
    }

    /// Switch the group to `track`, paused at the start
    pub async fn set_track(&self, track: TrackInfo) -> Result<()> {
        self.commit_local(TransportAction::SetTrack, move |_, _, ts, owner| {
            Ok(GroupPlaybackState {
                duration: track.duration,
                track: Some(track),
                playback_state: PlaybackState::Paused,
                position: 0.0,
                start_timestamp: ts,
                change_owner_id: Some(owner),
            })
        })
        .await
    }

    /// Mark the current track as finished for the whole group
    pub async fn end_of_track(&self) -> Result<()> {
        self.commit_local(TransportAction::EndOfTrack, |current, live, ts, owner| {
            Ok(GroupPlaybackState {
                playback_state: PlaybackState::Ended,
                position: current.duration.unwrap_or(live.target_position),
                start_timestamp: ts,
                change_owner_id: Some(owner),
                ..current.clone()
            })
        })
        .await
    }

    /// Write, apply and broadcast a local intent
    async fn commit_local<F>(&self, action: TransportAction, build: F) -> Result<()>
    where
        F: FnOnce(&GroupPlaybackState, Reconciled, Timestamp, ClientId) -> Result<GroupPlaybackState>,
    {
        self.require_active()?;
        let group_action = GroupAction::from(action);
        self.authorize_local(group_action)?;

        let current = self.store.current();
        let now = self.clock.now();
        // Local writes must always win over what this client has seen
        let ts = if now > current.start_timestamp {
            now
        } else {
            current.start_timestamp.next()
        };
        let next = build(&current, reconcile(&current, ts), ts, self.local_id.clone())?;

        debug!(
            client = %self.local_id,
            %action,
            position = next.position,
            state = %next.playback_state,
            start = %next.start_timestamp,
            "Local intent"
        );
        self.store.write_local(next.clone());

        let suspended = self.mark_out_of_sync_if_suspended();
        if !suspended {
            self.apply_state(&next, ActionSource::Local, false).await;
        }

        let sent = self
            .bus
            .broadcast(SessionMessage::Transport {
                action,
                state: next.clone(),
            })
            .await;

        if self.lifecycle() == Lifecycle::Disposed {
            // The record still follows what the bus did with the write
            match &sent {
                Ok(()) => {
                    self.store.confirm_local(&next);
                }
                Err(_) => {
                    self.store.rollback_local(&next);
                }
            }
            debug!(client = %self.local_id, %action, "Disposed while broadcasting");
            return Err(SyncError::Disposed);
        }

        match sent {
            Ok(()) => {
                self.store.confirm_local(&next);
                self.emit(GroupActionEvent::new(group_action, ActionSource::Local));
                Ok(())
            }
            Err(e) => {
                warn!(client = %self.local_id, %action, "Broadcast failed: {}", e);
                let err = SyncError::NotConnected(e.to_string());
                if let Some(restored) = self.store.rollback_local(&next) {
                    if !self.is_suspended() {
                        self.apply_state(&restored, ActionSource::Local, true).await;
                    }
                }
                self.emit(
                    GroupActionEvent::new(group_action, ActionSource::Local).with_error(err.clone()),
                );
                Err(err)
            }
        }
    }

    /// Re-broadcast the current group state
    pub async fn send_position_update(&self) -> Result<()> {
        self.require_active()?;
        let state = self.store.current();
        if state.is_none() {
            return Ok(());
        }
        self.bus
            .broadcast(SessionMessage::PositionUpdate { state })
            .await
            .map_err(|e| SyncError::NotConnected(e.to_string()))
    }

    // Suspensions

    /// Stop forcing group state onto the local player
    ///
    /// With a wait point, the player follows the group until the target
    /// enters the wait point's window, then holds there.
    pub async fn begin_suspension(
        self: &Arc<Self>,
        wait_point: Option<CoordinationWaitPoint>,
    ) -> Result<Suspension> {
        self.require_active()?;
        let id = self.suspensions.lock().insert(wait_point);
        debug!(client = %self.local_id, suspension = id, ?wait_point, "Suspension started");

        if wait_point.is_some() {
            self.reconcile_player(false).await;
        }
        Ok(Suspension::new(id, wait_point, Arc::downgrade(self)))
    }

    async fn end_suspension(&self, id: u64) -> Result<()> {
        self.require_active()?;
        let removed = self.suspensions.lock().remove(id);
        if removed {
            debug!(client = %self.local_id, suspension = id, "Suspension ended");
            self.reconcile_player(true).await;
        }
        Ok(())
    }

    fn release_suspension(&self, id: u64) {
        let mut suspensions = self.suspensions.lock();
        if suspensions.remove(id) {
            suspensions.needs_reconcile = true;
        }
    }

    pub fn is_suspended(&self) -> bool {
        !self.suspensions.lock().is_empty()
    }

    fn mark_out_of_sync_if_suspended(&self) -> bool {
        let mut suspensions = self.suspensions.lock();
        if suspensions.is_empty() {
            return false;
        }
        suspensions.out_of_sync = true;
        true
    }

    /// Force the local player to the group position
    pub async fn catch_up(&self) -> Result<()> {
        self.require_active()?;
        self.suspensions.lock().needs_reconcile = false;
        self.reconcile_player(true).await;
        self.emit(GroupActionEvent::new(GroupAction::Catchup, ActionSource::Local));
        Ok(())
    }

    async fn process_deferred(&self) {
        let pending = std::mem::take(&mut self.suspensions.lock().needs_reconcile);
        if pending {
            self.reconcile_player(true).await;
        }
    }

    // Applying state to the player

    async fn reconcile_player(&self, force: bool) {
        let state = self.store.current();
        self.apply_state(&state, ActionSource::Local, force).await;
    }

    /// Plan and apply the commands that move the player to `state`
    ///
    /// `force` clears the throttler so an authoritative correction is never
    /// suppressed.
    async fn apply_state(&self, state: &GroupPlaybackState, source: ActionSource, force: bool) {
        let now = self.clock.now();
        let live = reconcile(state, now);

        let target = {
            let mut suspensions = self.suspensions.lock();
            match suspensions.hold_for(live.target_position) {
                Hold::None => {
                    suspensions.out_of_sync = false;
                    live
                }
                Hold::All => {
                    suspensions.out_of_sync = true;
                    return;
                }
                Hold::At(position) => {
                    suspensions.out_of_sync = true;
                    Reconciled::new(position, PlaybackState::Paused)
                }
            }
        };

        let Some(sink) = self.sink() else {
            return;
        };
        if force {
            self.throttler.reset();
        }

        let commands = plan_commands(
            &target,
            state.track.as_ref(),
            &sink.snapshot(),
            self.config.max_playback_drift,
        );
        for command in commands {
            if self.throttler.send_action(&command, now) {
                debug!(client = %self.local_id, %command, "Applying to player");
                sink.apply(command, source.clone()).await;
            }
        }
    }

    // Sink binding

    /// Route planned commands to `sink`, replacing any previous binding
    pub fn bind(&self, sink: Weak<dyn TransportSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Remove `sink` if it is the current binding
    pub fn unbind(&self, sink: &Weak<dyn TransportSink>) {
        let mut bound = self.sink.write();
        if bound.as_ref().is_some_and(|b| Weak::ptr_eq(b, sink)) {
            *bound = None;
        }
    }

    fn sink(&self) -> Option<Arc<dyn TransportSink>> {
        self.sink.read().as_ref().and_then(Weak::upgrade)
    }

    // Observability

    pub fn local_client_id(&self) -> &ClientId {
        &self.local_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> CoordinatorStatus {
        match self.lifecycle() {
            Lifecycle::Uninitialized => CoordinatorStatus::Uninitialized,
            Lifecycle::Initializing => CoordinatorStatus::Initializing,
            Lifecycle::Disposed => CoordinatorStatus::Disposed,
            Lifecycle::Active => {
                let live = reconcile(&self.store.current(), self.clock.now());
                match live.playback_state {
                    PlaybackState::None => CoordinatorStatus::Idle,
                    PlaybackState::Playing => CoordinatorStatus::Playing,
                    PlaybackState::Paused | PlaybackState::Suspended => CoordinatorStatus::Paused,
                    PlaybackState::Ended => CoordinatorStatus::Ended,
                }
            }
        }
    }

    pub fn sync_status(&self) -> SyncStatus {
        let (suspended, out_of_sync) = {
            let suspensions = self.suspensions.lock();
            (!suspensions.is_empty(), suspensions.out_of_sync)
        };
        SyncStatus {
            suspended,
            out_of_sync,
            target_position: self.target_position(),
            pending_write: self.store.has_pending_write(),
        }
    }

    /// Where the group is now
    pub fn target_position(&self) -> Option<f64> {
        let state = self.store.current();
        if state.is_none() {
            return None;
        }
        Some(reconcile(&state, self.clock.now()).target_position)
    }

    pub fn group_state(&self) -> GroupPlaybackState {
        self.store.current()
    }

    pub fn watch_state(&self) -> watch::Receiver<GroupPlaybackState> {
        self.store.watch()
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<GroupActionEvent> {
        self.actions_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: GroupActionEvent) {
        debug!(
            client = %self.local_id,
            action = ?event.action,
            source = ?event.source,
            error = ?event.error,
            "Group action"
        );
        let _ = self.actions_tx.send(event);
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // Teardown

    /// Unsubscribe everything and stop the listener
    ///
    /// Idempotent. Commands still awaiting their broadcast fail with
    /// [`SyncError::Disposed`].
    pub fn dispose(&self) {
        {
            let mut lifecycle = self.lifecycle.write();
            if *lifecycle == Lifecycle::Disposed {
                return;
            }
            *lifecycle = Lifecycle::Disposed;
        }

        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        self.roster_subscription.lock().take();
        if let Ok(mut inbox) = self.inbox.try_lock() {
            inbox.take();
        }
        *self.sink.write() = None;
        self.suspensions.lock().clear();
        info!(client = %self.local_id, "Session coordinator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("local_id", &self.local_id)
            .field("lifecycle", &self.lifecycle())
            .field("state", &self.store)
            .finish()
    }
}
