//! Player synchronizer
//!
//! Binds one [`MediaPlayer`] to one [`SessionCoordinator`]. Coordinator
//! decisions become player calls; native player events (a user pressing the
//! player's own controls) become coordinator intents.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use livesync_state::{reconcile, CoordinationWaitPoint, PlaybackState, Reconciled, Timestamp, TrackInfo};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::command::{PlayerSnapshot, TransportCommand};
use crate::coordinator::{SessionCoordinator, Suspension};
use crate::error::{PlayerError, Result, SyncError};
use crate::events::{ActionSource, GroupAction, GroupActionEvent};
use crate::player::{MediaPlayer, PlayerEvent, TransportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EchoKind {
    Playing,
    Pause,
    Seeking,
}

impl EchoKind {
    fn of_event(event: &PlayerEvent) -> Option<Self> {
        match event {
            PlayerEvent::Playing => Some(EchoKind::Playing),
            PlayerEvent::Pause => Some(EchoKind::Pause),
            PlayerEvent::Seeking { .. } => Some(EchoKind::Seeking),
            PlayerEvent::Ended | PlayerEvent::Waiting => None,
        }
    }
}

#[derive(Debug)]
struct ExpectedEcho {
    kind: EchoKind,
    expires_at: Timestamp,
}

struct SynchronizerInner {
    player: Arc<dyn MediaPlayer>,
    coordinator: Arc<SessionCoordinator>,
    view_only: AtomicBool,
    ended: AtomicBool,
    echoes: Mutex<VecDeque<ExpectedEcho>>,
    echo_ttl: Duration,
}

impl SynchronizerInner {
    fn expect_echo(&self, kind: EchoKind) {
        let expires_at = self.coordinator.clock().now().saturating_add(self.echo_ttl);
        self.echoes.lock().push_back(ExpectedEcho { kind, expires_at });
    }

    /// Consume a pending echo of `kind`, dropping expired ones
    fn consume_echo(&self, kind: EchoKind, now: Timestamp) -> bool {
        let mut echoes = self.echoes.lock();
        echoes.retain(|echo| echo.expires_at >= now);
        match echoes.iter().position(|echo| echo.kind == kind) {
            Some(index) => {
                echoes.remove(index);
                true
            }
            None => false,
        }
    }

    async fn play_with_recovery(&self, source: ActionSource) {
        let reason = match self.player.play().await {
            Ok(()) => return,
            Err(PlayerError::NotAllowed(reason)) => reason,
            Err(e) => {
                warn!("Player refused play: {}", e);
                self.coordinator.emit(
                    GroupActionEvent::new(GroupAction::Play, source).with_error(e.into()),
                );
                return;
            }
        };

        warn!("Autoplay blocked ({}), retrying muted", reason);
        self.player.set_muted(true);
        let recovered = match self.player.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Muted retry failed: {}", e);
                false
            }
        };
        self.coordinator.emit(
            GroupActionEvent::new(GroupAction::Play, source)
                .with_error(SyncError::PlaybackRejected { reason, recovered }),
        );
    }
}

#[async_trait]
impl TransportSink for SynchronizerInner {
    fn snapshot(&self) -> PlayerSnapshot {
        self.player.snapshot()
    }

    async fn apply(&self, command: TransportCommand, source: ActionSource) {
        if self.ended.load(Ordering::Acquire) {
            return;
        }
        trace!(%command, ?source, "Synchronizer applying command");
        match command {
            TransportCommand::Load(track) => {
                if let Some(src) = track.src.as_deref() {
                    self.player.load(src);
                }
            }
            TransportCommand::SeekTo(position) => {
                self.expect_echo(EchoKind::Seeking);
                self.player.set_current_time(position);
            }
            TransportCommand::Pause => {
                self.expect_echo(EchoKind::Pause);
                self.player.pause();
            }
            TransportCommand::Play => {
                self.expect_echo(EchoKind::Playing);
                self.play_with_recovery(source).await;
            }
        }
    }
}

/// Keeps one player in step with the group
pub struct MediaSynchronizer {
    inner: Arc<SynchronizerInner>,
}

impl MediaSynchronizer {
    /// Bind `player` to `coordinator`
    ///
    /// Replaces any sink previously bound to the coordinator.
    pub fn new(player: Arc<dyn MediaPlayer>, coordinator: Arc<SessionCoordinator>) -> Self {
        let inner = Arc::new(SynchronizerInner {
            echo_ttl: coordinator.config().echo_ttl,
            player,
            coordinator,
            view_only: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            echoes: Mutex::new(VecDeque::new()),
        });
        let sink: Arc<dyn TransportSink> = inner.clone();
        inner.coordinator.bind(Arc::downgrade(&sink));
        Self { inner }
    }

    pub fn player(&self) -> &Arc<dyn MediaPlayer> {
        &self.inner.player
    }

    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.inner.coordinator
    }

    /// Observe without driving transport
    pub fn set_view_only(&self, view_only: bool) {
        self.inner.view_only.store(view_only, Ordering::Release);
    }

    pub fn is_view_only(&self) -> bool {
        self.inner.view_only.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::Acquire)
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_ended() {
            return Err(SyncError::Disposed);
        }
        if self.is_view_only() {
            return Err(SyncError::ViewOnly);
        }
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        self.check_writable()?;
        self.inner.coordinator.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.check_writable()?;
        self.inner.coordinator.pause().await
    }

    pub async fn seek_to(&self, position: f64) -> Result<()> {
        self.check_writable()?;
        self.inner.coordinator.seek_to(position).await
    }

    pub async fn set_track(&self, track: TrackInfo) -> Result<()> {
        self.check_writable()?;
        self.inner.coordinator.set_track(track).await
    }

    /// Diverge from the group; see [`SessionCoordinator::begin_suspension`]
    pub async fn begin_suspension(
        &self,
        wait_point: Option<CoordinationWaitPoint>,
    ) -> Result<Suspension> {
        if self.is_ended() {
            return Err(SyncError::Disposed);
        }
        self.inner.coordinator.begin_suspension(wait_point).await
    }

    /// Feed a native player event
    ///
    /// Echoes of commands the synchronizer applied itself are swallowed.
    /// Anything else that disagrees with the group state becomes a local
    /// intent, or in view-only mode is corrected back to the group state.
    pub async fn handle_player_event(&self, event: PlayerEvent) -> Result<()> {
        if self.is_ended() {
            return Err(SyncError::Disposed);
        }
        let coordinator = &self.inner.coordinator;
        let now = coordinator.clock().now();

        if let Some(kind) = EchoKind::of_event(&event) {
            if self.inner.consume_echo(kind, now) {
                trace!(?event, "Ignoring echo of applied command");
                return Ok(());
            }
        }
        if event == PlayerEvent::Waiting {
            debug!("Player is buffering");
            return Ok(());
        }
        if coordinator.is_suspended() {
            trace!(?event, "Suspended, not forwarding player event");
            return Ok(());
        }

        let live = reconcile(&coordinator.group_state(), now);
        if self.is_consistent(&event, &live) {
            return Ok(());
        }

        if self.is_view_only() {
            debug!(?event, "View-only player diverged, correcting");
            return coordinator.catch_up().await;
        }

        debug!(?event, "Forwarding player event as local intent");
        match event {
            PlayerEvent::Playing => coordinator.play().await,
            PlayerEvent::Pause => coordinator.pause().await,
            PlayerEvent::Seeking { position } => coordinator.seek_to(position).await,
            PlayerEvent::Ended => coordinator.end_of_track().await,
            PlayerEvent::Waiting => Ok(()),
        }
    }

    fn is_consistent(&self, event: &PlayerEvent, live: &Reconciled) -> bool {
        match event {
            PlayerEvent::Playing => live.is_playing(),
            PlayerEvent::Pause => !live.is_playing(),
            PlayerEvent::Seeking { position } => {
                let drift = self.inner.coordinator.config().max_playback_drift;
                (position - live.target_position).abs() <= drift.as_secs_f64()
            }
            PlayerEvent::Ended => live.playback_state == PlaybackState::Ended,
            PlayerEvent::Waiting => true,
        }
    }

    /// Detach from the coordinator
    ///
    /// Idempotent; later calls do nothing.
    pub fn end(&self) {
        if self.inner.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        let sink: Arc<dyn TransportSink> = self.inner.clone();
        let weak: Weak<dyn TransportSink> = Arc::downgrade(&sink);
        self.inner.coordinator.unbind(&weak);
        self.inner.echoes.lock().clear();
        debug!(client = %self.inner.coordinator.local_client_id(), "Synchronizer ended");
    }
}

impl Drop for MediaSynchronizer {
    fn drop(&mut self) {
        self.end();
    }
}

impl std::fmt::Debug for MediaSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSynchronizer")
            .field("view_only", &self.is_view_only())
            .field("ended", &self.is_ended())
            .finish()
    }
}
