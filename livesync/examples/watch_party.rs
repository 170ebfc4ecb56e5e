//! Two viewers watching the same video, the second one joining late
//!
//! Usage: cargo run -p livesync --example watch_party
//!
//! Set `LIVESYNC_LOG_LEVEL=livesync=debug` to see every decision the
//! coordinators make.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use livesync::logging::{init_logging, LoggingMode};
use livesync::prelude::*;
use livesync::PlayerError;
use parking_lot::Mutex;

/// Prints every call instead of rendering video
struct ConsolePlayer {
    name: &'static str,
    state: Mutex<(Option<String>, f64, bool, bool)>,
}

impl ConsolePlayer {
    fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            state: Mutex::new((None, 0.0, true, false)),
        })
    }
}

#[async_trait]
impl MediaPlayer for ConsolePlayer {
    fn current_time(&self) -> f64 {
        self.state.lock().1
    }

    fn set_current_time(&self, seconds: f64) {
        println!("[{}] seek to {:.2}s", self.name, seconds);
        self.state.lock().1 = seconds;
    }

    fn paused(&self) -> bool {
        self.state.lock().2
    }

    fn src(&self) -> Option<String> {
        self.state.lock().0.clone()
    }

    fn load(&self, src: &str) {
        println!("[{}] load {}", self.name, src);
        *self.state.lock() = (Some(src.to_string()), 0.0, true, false);
    }

    async fn play(&self) -> std::result::Result<(), PlayerError> {
        println!("[{}] play", self.name);
        self.state.lock().2 = false;
        Ok(())
    }

    fn pause(&self) {
        println!("[{}] pause", self.name);
        self.state.lock().2 = true;
    }

    fn muted(&self) -> bool {
        self.state.lock().3
    }

    fn set_muted(&self, muted: bool) {
        self.state.lock().3 = muted;
    }
}

async fn viewer(
    hub: &MemoryHub,
    clock: Arc<dyn Clock>,
    id: &'static str,
) -> Result<(Arc<ConsolePlayer>, MediaSynchronizer)> {
    let roster = Arc::new(StaticRoster::new(id, vec![RoleId::from("viewer")]));
    let coordinator = SessionCoordinator::builder(Arc::new(hub.connect(id)), clock, roster)
        .config(SessionConfig::strict())
        .build()?;
    coordinator.initialize(vec![]).await?;
    coordinator.spawn().await?;

    let mut actions = coordinator.subscribe_actions();
    tokio::spawn(async move {
        while let Ok(event) = actions.recv().await {
            println!("[{}] group action {:?} from {:?}", id, event.action, event.source);
        }
    });

    let player = ConsolePlayer::new(id);
    let sync = MediaSynchronizer::new(player.clone(), coordinator);
    Ok((player, sync))
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = init_logging(LoggingMode::Development) {
        eprintln!("logging disabled: {}", e);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let hub = MemoryHub::new(clock.clone());

    let (_alice_player, alice) = viewer(&hub, clock.clone(), "alice").await?;
    alice
        .set_track(
            TrackInfo::new("big-buck-bunny")
                .with_src("https://media.example/bbb.mp4")
                .with_title("Big Buck Bunny")
                .with_duration(596.0),
        )
        .await?;
    alice.play().await?;

    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("--- bob joins three seconds in ---");
    let (bob_player, bob) = viewer(&hub, clock.clone(), "bob").await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("bob is at {:.2}s", bob_player.current_time());

    println!("--- bob pauses for everyone ---");
    bob.pause().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("group state: {:?}", alice.coordinator().group_state().playback_state);

    alice.end();
    bob.end();
    alice.coordinator().dispose();
    bob.coordinator().dispose();
    Ok(())
}
