//! Test helpers for multi-client session tests
//!
//! A [`TestSession`] owns a shared manual clock and an in-memory hub.
//! Clients joined to it get a recording [`MockPlayer`] bound through a
//! [`MediaSynchronizer`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livesync::{
    ClientId, ClientRoleInfo, Envelope, GroupActionEvent, ManualClock,
    MediaPlayer, MediaSynchronizer, MemoryHub, PlayerError, RoleId, SessionConfig,
    SessionCoordinator, SessionMessage, StaticRoster, Timestamp, TrackInfo,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

pub const SESSION_START_MS: u64 = 1_000_000;

/// A call made on a [`MockPlayer`]
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCall {
    Load(String),
    Seek(f64),
    Play,
    Pause,
    Mute(bool),
}

#[derive(Debug, Default)]
struct MockState {
    src: Option<String>,
    current_time: f64,
    paused: bool,
    muted: bool,
}

/// Player that records every call and never advances on its own
#[derive(Debug)]
pub struct MockPlayer {
    state: Mutex<MockState>,
    calls: Mutex<Vec<PlayerCall>>,
    autoplay_rejections: AtomicUsize,
}

impl MockPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                paused: true,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            autoplay_rejections: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> Vec<PlayerCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                PlayerCall::Seek(position) => Some(*position),
                _ => None,
            })
            .collect()
    }

    /// Reject the next `count` play() calls with NotAllowed
    pub fn reject_autoplay(&self, count: usize) {
        self.autoplay_rejections.store(count, Ordering::SeqCst);
    }

    /// Move the playhead without recording a call, as natural playback would
    pub fn advance_playhead(&self, seconds: f64) {
        self.state.lock().current_time += seconds;
    }

    /// Simulate the user pressing the player's own controls
    pub fn user_set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
    }
}

#[async_trait]
impl MediaPlayer for MockPlayer {
    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.state.lock().current_time = seconds;
        self.calls.lock().push(PlayerCall::Seek(seconds));
    }

    fn paused(&self) -> bool {
        self.state.lock().paused
    }

    fn src(&self) -> Option<String> {
        self.state.lock().src.clone()
    }

    fn load(&self, src: &str) {
        {
            let mut state = self.state.lock();
            state.src = Some(src.to_string());
            state.current_time = 0.0;
            state.paused = true;
        }
        self.calls.lock().push(PlayerCall::Load(src.to_string()));
    }

    async fn play(&self) -> Result<(), PlayerError> {
        let rejected = self
            .autoplay_rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(PlayerError::NotAllowed(
                "play() requires a user gesture".to_string(),
            ));
        }
        self.state.lock().paused = false;
        self.calls.lock().push(PlayerCall::Play);
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
        self.calls.lock().push(PlayerCall::Pause);
    }

    fn muted(&self) -> bool {
        self.state.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().muted = muted;
        self.calls.lock().push(PlayerCall::Mute(muted));
    }
}

/// One simulated session member
pub struct TestClient {
    pub id: ClientId,
    pub roles: Vec<RoleId>,
    pub roster: Arc<StaticRoster>,
    pub coordinator: Arc<SessionCoordinator>,
    pub player: Arc<MockPlayer>,
    pub sync: MediaSynchronizer,
}

impl TestClient {
    /// Drain this client's inbox
    pub async fn pump(&self) -> usize {
        self.coordinator.pump().await.unwrap_or(0)
    }

    pub fn actions(&self) -> broadcast::Receiver<GroupActionEvent> {
        self.coordinator.subscribe_actions()
    }
}

/// Shared clock and hub for a group of clients
pub struct TestSession {
    pub clock: ManualClock,
    pub hub: MemoryHub,
}

impl TestSession {
    pub fn new() -> Self {
        let clock = ManualClock::new(Timestamp::from_millis(SESSION_START_MS));
        let hub = MemoryHub::new(Arc::new(clock.clone()));
        Self { clock, hub }
    }

    pub fn advance(&self, millis: u64) {
        self.clock.advance(Duration::from_millis(millis));
    }

    pub fn now(&self) -> Timestamp {
        use livesync::Clock;
        self.clock.now()
    }

    /// Build a client without initializing its coordinator
    pub fn build_client(&self, id: &str, roles: Vec<RoleId>, config: SessionConfig) -> TestClient {
        let client_id = ClientId::from(id);
        let bus = Arc::new(self.hub.connect(client_id.clone()));
        let roster = Arc::new(StaticRoster::new(client_id.clone(), roles.clone()));
        let coordinator = SessionCoordinator::builder(bus, Arc::new(self.clock.clone()), roster.clone())
            .config(config)
            .build()
            .expect("valid config");
        let player = MockPlayer::new();
        let sync = MediaSynchronizer::new(player.clone(), coordinator.clone());

        TestClient {
            id: client_id,
            roles,
            roster,
            coordinator,
            player,
            sync,
        }
    }

    /// Build and initialize an unrestricted client
    pub async fn join(&self, id: &str) -> TestClient {
        self.join_with(id, vec![], vec![]).await
    }

    pub async fn join_with(&self, id: &str, roles: Vec<RoleId>, eligible: Vec<RoleId>) -> TestClient {
        let client = self.build_client(id, roles, SessionConfig::default());
        client
            .coordinator
            .initialize(eligible)
            .await
            .expect("initialize");
        client
    }

    /// Make every client's roster aware of every other client's roles
    pub fn introduce(&self, clients: &[&TestClient]) {
        for target in clients {
            for other in clients {
                if target.id != other.id {
                    target
                        .roster
                        .upsert(ClientRoleInfo::new(other.id.clone(), other.roles.clone()));
                }
            }
        }
    }

    /// Pump every client until no notices remain
    pub async fn settle(&self, clients: &[&TestClient]) {
        for _ in 0..32 {
            let mut handled = 0;
            for client in clients {
                handled += client.pump().await;
            }
            if handled == 0 {
                return;
            }
        }
        panic!("session did not settle");
    }

    /// Last message broadcast by `sender`
    pub fn last_sent_by(&self, sender: &ClientId) -> Option<Envelope> {
        self.hub
            .sent()
            .into_iter()
            .rev()
            .find(|envelope| envelope.sender == *sender)
    }

    /// How many transport messages `sender` has broadcast
    pub fn transports_sent_by(&self, sender: &ClientId) -> usize {
        self.hub
            .sent()
            .iter()
            .filter(|envelope| {
                envelope.sender == *sender
                    && matches!(envelope.message, SessionMessage::Transport { .. })
            })
            .count()
    }
}

/// A track with a source and a 600 second duration
pub fn intro_track() -> TrackInfo {
    TrackInfo::new("intro")
        .with_src("https://media.example/intro.mp4")
        .with_title("Intro")
        .with_duration(600.0)
}

pub const INTRO_SRC: &str = "https://media.example/intro.mp4";

/// Drain every event currently queued on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<GroupActionEvent>) -> Vec<GroupActionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
