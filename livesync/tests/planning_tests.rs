//! Command planning and throttling
//!
//! Table-driven checks of the planner and the repeated-action throttler,
//! plus a session-level check that bursts of updates do not hammer the
//! player.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{intro_track, MockPlayer, PlayerCall, TestClient, TestSession, INTRO_SRC};
use livesync::{
    plan_commands, ActionThrottler, ClientId, MediaSynchronizer, PassthroughThrottler,
    PlaybackState, PlayerSnapshot, Reconciled, RepeatedActionThrottler, SessionCoordinator,
    StaticRoster, Timestamp, TrackInfo, TransportCommand,
};
use rstest::rstest;

const DRIFT: Duration = Duration::from_secs(1);

fn loaded(current_time: f64, paused: bool) -> PlayerSnapshot {
    PlayerSnapshot {
        src: Some(INTRO_SRC.to_string()),
        current_time,
        paused,
    }
}

#[rstest]
#[case(Reconciled::new(10.0, PlaybackState::Paused), loaded(10.2, false), vec![TransportCommand::Pause])]
#[case(Reconciled::new(10.0, PlaybackState::Playing), loaded(10.0, true), vec![TransportCommand::Play])]
#[case(Reconciled::new(10.0, PlaybackState::Playing), loaded(10.5, false), vec![])]
#[case(Reconciled::new(12.0, PlaybackState::Playing), loaded(10.0, false), vec![TransportCommand::SeekTo(12.0)])]
#[case(
    Reconciled::new(30.0, PlaybackState::Paused),
    loaded(10.0, false),
    vec![TransportCommand::Pause, TransportCommand::SeekTo(30.0)]
)]
#[case(
    Reconciled::new(600.0, PlaybackState::Ended),
    loaded(598.0, false),
    vec![TransportCommand::Pause, TransportCommand::SeekTo(600.0)]
)]
#[case(Reconciled::new(0.0, PlaybackState::None), loaded(42.0, false), vec![])]
fn test_plan_for_loaded_player(
    #[case] target: Reconciled,
    #[case] snapshot: PlayerSnapshot,
    #[case] expected: Vec<TransportCommand>,
) {
    let track = intro_track();
    assert_eq!(plan_commands(&target, Some(&track), &snapshot, DRIFT), expected);
}

#[rstest]
#[case(None, vec![TransportCommand::SeekTo(5.0)])]
#[case(Some("https://media.example/other.mp4"), vec![
    TransportCommand::Load(intro_track()),
    TransportCommand::SeekTo(5.0),
])]
fn test_plan_loads_only_on_source_change(
    #[case] playing_src: Option<&str>,
    #[case] expected: Vec<TransportCommand>,
) {
    let snapshot = PlayerSnapshot {
        src: Some(playing_src.unwrap_or(INTRO_SRC).to_string()),
        current_time: 0.0,
        paused: true,
    };
    let target = Reconciled::new(5.0, PlaybackState::Paused);
    assert_eq!(plan_commands(&target, Some(&intro_track()), &snapshot, DRIFT), expected);
}

#[test]
fn test_plan_without_source_never_loads() {
    let track = TrackInfo::new("chapter-2").with_duration(300.0);
    let target = Reconciled::new(0.0, PlaybackState::Playing);
    let commands = plan_commands(&target, Some(&track), &PlayerSnapshot::default(), DRIFT);
    assert!(commands.is_empty());
}

#[rstest]
#[case(TransportCommand::SeekTo(5.0), TransportCommand::SeekTo(5.0), 100, false)]
#[case(TransportCommand::SeekTo(5.0), TransportCommand::SeekTo(5.0), 250, true)]
#[case(TransportCommand::SeekTo(5.0), TransportCommand::SeekTo(5.004), 100, false)]
#[case(TransportCommand::SeekTo(5.0), TransportCommand::SeekTo(6.0), 100, true)]
#[case(TransportCommand::Play, TransportCommand::Play, 100, false)]
#[case(TransportCommand::Play, TransportCommand::Pause, 0, true)]
#[case(TransportCommand::Load(intro_track()), TransportCommand::Load(intro_track()), 10, false)]
fn test_repeated_action_throttling(
    #[case] first: TransportCommand,
    #[case] second: TransportCommand,
    #[case] gap_ms: u64,
    #[case] second_sent: bool,
) {
    let throttler = RepeatedActionThrottler::default();
    assert!(throttler.send_action(&first, Timestamp::from_millis(10_000)));
    assert_eq!(
        throttler.send_action(&second, Timestamp::from_millis(10_000 + gap_ms)),
        second_sent
    );
}

/// A client whose coordinator uses `throttler`
async fn client_with_throttler(
    session: &TestSession,
    id: &str,
    throttler: Arc<dyn ActionThrottler>,
) -> TestClient {
    let client_id = ClientId::from(id);
    let bus = Arc::new(session.hub.connect(client_id.clone()));
    let roster = Arc::new(StaticRoster::new(client_id.clone(), vec![]));
    let coordinator = SessionCoordinator::builder(bus, Arc::new(session.clock.clone()), roster.clone())
        .throttler(throttler)
        .build()
        .unwrap();
    coordinator.initialize(vec![]).await.unwrap();
    let player = MockPlayer::new();
    let sync = MediaSynchronizer::new(player.clone(), coordinator.clone());
    TestClient {
        id: client_id,
        roles: vec![],
        roster,
        coordinator,
        player,
        sync,
    }
}

/// B's player refuses to start; A keeps re-asserting the playing state
async fn stuck_player_burst(throttler: Arc<dyn ActionThrottler>) -> (TestSession, TestClient, TestClient) {
    let session = TestSession::new();
    let a = session.join("client-a").await;
    let b = client_with_throttler(&session, "client-b", throttler).await;

    a.sync.set_track(intro_track()).await.unwrap();
    session.advance(10);
    a.sync.play().await.unwrap();

    b.player.reject_autoplay(2);
    b.pump().await;
    assert_eq!(
        b.player.calls(),
        vec![PlayerCall::Load(INTRO_SRC.to_string()), PlayerCall::Mute(true)]
    );

    session.advance(100);
    a.coordinator.send_position_update().await.unwrap();
    b.pump().await;
    (session, a, b)
}

#[tokio::test]
async fn test_burst_is_throttled() {
    let (session, a, b) = stuck_player_burst(Arc::new(RepeatedActionThrottler::default())).await;
    assert_eq!(b.player.calls().len(), 2, "repeat play inside the window");

    // Once the window has passed the repeat goes through
    session.advance(300);
    a.coordinator.send_position_update().await.unwrap();
    b.pump().await;
    assert_eq!(b.player.calls().last(), Some(&PlayerCall::Play));
}

#[tokio::test]
async fn test_burst_without_throttling_reaches_player() {
    let (_session, _a, b) = stuck_player_burst(Arc::new(PassthroughThrottler)).await;
    assert_eq!(
        b.player.calls(),
        vec![
            PlayerCall::Load(INTRO_SRC.to_string()),
            PlayerCall::Mute(true),
            PlayerCall::Play,
        ]
    );
}
