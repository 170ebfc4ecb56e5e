//! Late joiner catch-up
//!
//! A client that joins after playback started must land where the group is
//! now, not where it was when playback started.

mod helpers;

use helpers::{intro_track, PlayerCall, TestSession, INTRO_SRC};
use livesync::{CoordinatorStatus, GroupAction, PlaybackState, SessionMessage};

#[tokio::test]
async fn test_late_joiner_seeks_once_then_plays() {
    let session = TestSession::new();
    let a = session.join("client-a").await;

    a.sync.set_track(intro_track()).await.unwrap();
    session.advance(500);
    a.sync.play().await.unwrap();
    assert_eq!(a.player.calls(), vec![PlayerCall::Load(INTRO_SRC.to_string()), PlayerCall::Play]);

    // B shows up five seconds later
    session.advance(5_000);
    let b = session.join("client-b").await;
    let mut b_actions = b.actions();

    assert_eq!(a.pump().await, 1, "A should see B's join");
    assert_eq!(b.pump().await, 1, "B should see A's reply");

    let target = b.coordinator.target_position().unwrap();
    assert!((target - 5.0).abs() < 0.1, "target was {}", target);
    assert_eq!(b.coordinator.status(), CoordinatorStatus::Playing);
    assert_eq!(
        b.player.calls(),
        vec![
            PlayerCall::Load(INTRO_SRC.to_string()),
            PlayerCall::Seek(5.0),
            PlayerCall::Play,
        ]
    );

    let event = b_actions.try_recv().unwrap();
    assert_eq!(event.action, GroupAction::Catchup);
    assert!(event.error.is_none());
}

#[tokio::test]
async fn test_reply_carries_original_timestamp() {
    let session = TestSession::new();
    let a = session.join("client-a").await;
    a.sync.set_track(intro_track()).await.unwrap();
    a.sync.play().await.unwrap();
    let written = a.coordinator.group_state();

    session.advance(5_000);
    let b = session.join("client-b").await;
    a.pump().await;

    let reply = session.last_sent_by(&a.id).unwrap();
    match reply.message {
        SessionMessage::PositionUpdate { state } => {
            assert_eq!(state, written);
            assert_eq!(state.playback_state, PlaybackState::Playing);
        }
        other => panic!("expected position update, got {:?}", other),
    }

    b.pump().await;
    assert_eq!(b.coordinator.group_state(), written);
}

#[tokio::test]
async fn test_duplicate_delivery_does_not_seek_again() {
    let session = TestSession::new();
    let a = session.join("client-a").await;
    a.sync.set_track(intro_track()).await.unwrap();
    session.advance(500);
    a.sync.play().await.unwrap();

    session.advance(5_000);
    let b = session.join("client-b").await;
    a.pump().await;
    b.pump().await;
    assert_eq!(b.player.seeks(), vec![5.0]);

    // At-least-once delivery: the same reply arrives again shortly after
    let reply = session.last_sent_by(&a.id).unwrap();
    session.advance(100);
    session.hub.deliver(&b.id, &reply).unwrap();
    assert_eq!(b.pump().await, 1);

    assert_eq!(b.player.seeks(), vec![5.0]);
    assert_eq!(b.player.calls().len(), 3);
}

#[tokio::test]
async fn test_joiner_before_any_track_gets_nothing() {
    let session = TestSession::new();
    let a = session.join("client-a").await;
    let b = session.join("client-b").await;

    a.pump().await;
    assert_eq!(b.pump().await, 0);
    assert!(b.coordinator.group_state().is_none());
    assert_eq!(b.coordinator.status(), CoordinatorStatus::Idle);
    assert!(b.player.calls().is_empty());
}

#[tokio::test]
async fn test_joiner_after_track_finished_lands_on_ended() {
    let session = TestSession::new();
    let a = session.join("client-a").await;
    a.sync.set_track(intro_track()).await.unwrap();
    a.sync.seek_to(590.0).await.unwrap();
    a.sync.play().await.unwrap();

    session.advance(30_000);
    let b = session.join("client-b").await;
    session.settle(&[&a, &b]).await;

    assert_eq!(b.coordinator.status(), CoordinatorStatus::Ended);
    assert_eq!(b.coordinator.target_position(), Some(600.0));
    assert_eq!(
        b.player.calls(),
        vec![PlayerCall::Load(INTRO_SRC.to_string()), PlayerCall::Seek(600.0)]
    );
}
