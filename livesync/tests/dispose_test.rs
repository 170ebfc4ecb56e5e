//! Disposing a coordinator while a command is still being broadcast

mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use helpers::{intro_track, MockPlayer, TestSession};
use livesync::{
    BusError, BusSubscription, ClientId, EventBus, MediaSynchronizer, MemoryBus, SessionCoordinator,
    SessionMessage, StaticRoster, SyncError,
};
use tokio::sync::Notify;

/// Bus whose next broadcast parks until released
struct GatedBus {
    inner: MemoryBus,
    armed: AtomicBool,
    fail: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedBus {
    fn new(inner: MemoryBus) -> Arc<Self> {
        Arc::new(Self {
            inner,
            armed: AtomicBool::new(false),
            fail: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    fn arm(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
        self.armed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventBus for GatedBus {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn broadcast(&self, message: SessionMessage) -> Result<(), BusError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
            if self.fail.load(Ordering::SeqCst) {
                return Err(BusError::Disconnected);
            }
        }
        self.inner.broadcast(message).await
    }

    fn subscribe(&self) -> BusSubscription {
        self.inner.subscribe()
    }
}

async fn gated_client(
    session: &TestSession,
    id: &str,
) -> (Arc<GatedBus>, Arc<SessionCoordinator>, MediaSynchronizer) {
    let client_id = ClientId::from(id);
    let bus = GatedBus::new(session.hub.connect(client_id.clone()));
    let roster = Arc::new(StaticRoster::new(client_id, vec![]));
    let coordinator = SessionCoordinator::builder(bus.clone(), Arc::new(session.clock.clone()), roster)
        .build()
        .unwrap();
    coordinator.initialize(vec![]).await.unwrap();
    let sync = MediaSynchronizer::new(MockPlayer::new(), coordinator.clone());
    (bus, coordinator, sync)
}

#[tokio::test]
async fn test_dispose_fails_in_flight_command_that_was_delivered() {
    let session = TestSession::new();
    let peer = session.join("client-b").await;
    let (bus, coordinator, _sync) = gated_client(&session, "client-a").await;

    bus.arm(false);
    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.set_track(intro_track()).await })
    };
    bus.entered.notified().await;
    assert!(coordinator.sync_status().pending_write);

    coordinator.dispose();
    bus.release.notify_one();

    assert_eq!(in_flight.await.unwrap(), Err(SyncError::Disposed));

    // Peers have the write, so it stays as the confirmed record
    let state = coordinator.group_state();
    assert_eq!(state.track, Some(intro_track()));
    assert!(!coordinator.sync_status().pending_write);

    peer.pump().await;
    assert_eq!(peer.coordinator.group_state(), state);
}

#[tokio::test]
async fn test_dispose_fails_in_flight_command_that_was_lost() {
    let session = TestSession::new();
    let peer = session.join("client-b").await;
    let (bus, coordinator, _sync) = gated_client(&session, "client-a").await;

    bus.arm(true);
    let in_flight = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.set_track(intro_track()).await })
    };
    bus.entered.notified().await;

    coordinator.dispose();
    bus.release.notify_one();

    assert_eq!(in_flight.await.unwrap(), Err(SyncError::Disposed));
    assert!(coordinator.group_state().is_none());
    assert!(!coordinator.sync_status().pending_write);

    assert_eq!(peer.pump().await, 1, "only A's join reaches the peer");
    assert!(peer.coordinator.group_state().is_none());
}
