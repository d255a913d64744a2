//! Session manager tests against the simulated engine.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::*;
use crate::capture::CaptureConstraints;
use crate::engine::EngineConnectionState;
use crate::error::{CaptureError, TokenError};
use crate::media::{MediaId, MediaOrigin};
use crate::sim::{SimBehavior, SimCapture, SimEngine};
use crate::token::{AccessKey, LocalTokenGenerator, Token};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    manager: RoomSessionManager,
    engine: Arc<SimEngine>,
    capture: Arc<SimCapture>,
    key: String,
}

fn harness(behavior: SimBehavior) -> Harness {
    harness_with(behavior, SimCapture::new())
}

fn harness_with(behavior: SimBehavior, capture: SimCapture) -> Harness {
    harness_with_tokens(behavior, capture, Arc::new(LocalTokenGenerator::default()))
}

fn harness_with_tokens(
    behavior: SimBehavior,
    capture: SimCapture,
    tokens: Arc<dyn TokenGenerator>,
) -> Harness {
    let engine = Arc::new(SimEngine::new(behavior));
    let capture = Arc::new(capture);
    let manager = RoomSessionManager::new(
        ManagerConfig::default(),
        Arc::clone(&engine) as Arc<dyn RoomEngine>,
        tokens,
        Arc::clone(&capture) as Arc<dyn AudioCapture>,
    );
    Harness {
        manager,
        engine,
        capture,
        key: AccessKey::generate().as_str().to_string(),
    }
}

/// Token issuer that refuses every request.
struct RejectingTokens;

impl TokenGenerator for RejectingTokens {
    fn generate(&self, _: &AccessKey, _: &str, _: &str) -> Result<Token, TokenError> {
        Err(TokenError::Rejected("quota exceeded".into()))
    }
}

fn with_bob() -> SimBehavior {
    SimBehavior {
        present_peers: vec![(1, "bob".into())],
        ..SimBehavior::default()
    }
}

async fn wait_for_state(rx: &mut watch::Receiver<ConnectionState>, want: ConnectionState) {
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == want))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

async fn wait_for_roster(
    rx: &mut watch::Receiver<Arc<Roster>>,
    pred: impl FnMut(&Arc<Roster>) -> bool,
) {
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for roster")
        .expect("roster channel closed");
}

/// Connect and wait until the state machine reports `Connected`.
async fn connect_ok(h: &Harness) -> SessionId {
    let id = h.manager.connect(&h.key, "Random", "alice").await.unwrap();
    wait_for_state(&mut h.manager.connection_state(), ConnectionState::Connected).await;
    id
}

async fn wait_for_local_media(h: &Harness) -> MediaHandle {
    for _ in 0..200 {
        if let Some(local) = h.manager.local_media().await.filter(|m| m.started) {
            assert_eq!(local.origin, MediaOrigin::Local);
            return local;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("local media never started");
}

#[tokio::test]
async fn empty_access_key_is_rejected_without_engine_call() {
    let h = harness(SimBehavior::default());
    let err = h.manager.connect("", "Random", "alice").await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredential(_)));
    assert_eq!(h.engine.init_calls(), 0);
    assert_eq!(h.manager.current_state(), ConnectionState::Error);
    assert!(h.manager.current_roster().is_empty());
}

#[tokio::test]
async fn malformed_access_key_is_rejected_without_engine_call() {
    let h = harness(SimBehavior::default());
    let err = h
        .manager
        .connect("AK-definitely-not-a-key", "Random", "alice")
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredential(_)));
    assert_eq!(h.engine.init_calls(), 0);
    assert_eq!(h.manager.current_state(), ConnectionState::Error);
}

#[tokio::test]
async fn connect_then_peer_joined_is_observed() {
    let h = harness(with_bob());
    connect_ok(&h).await;

    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(1))).await;

    let snapshot = h.manager.current_roster();
    assert_eq!(snapshot.len(), 1);
    let bob = snapshot.get(PeerId(1)).unwrap();
    assert_eq!(bob.user_name(), "bob");
    assert!(!bob.talking);
    assert_eq!(h.manager.current_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn peers_present_at_join_are_captured() {
    let behavior = SimBehavior {
        present_peers: vec![(1, "bob".into()), (2, "carol".into()), (3, "dave".into())],
        ..SimBehavior::default()
    };
    let h = harness(behavior);
    connect_ok(&h).await;

    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.len() == 3).await;
    assert_eq!(
        h.manager.current_roster().ids(),
        vec![PeerId(1), PeerId(2), PeerId(3)]
    );
}

#[tokio::test]
async fn empty_key_after_transport_close_moves_to_error() {
    let h = harness(with_bob());
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();
    session.connection_state(EngineConnectionState::Disconnected);
    wait_for_state(&mut h.manager.connection_state(), ConnectionState::Disconnected).await;
    assert!(h.manager.active_session().await.is_none());

    let err = h.manager.connect("", "Random", "alice").await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidCredential(_)));
    assert_eq!(h.manager.current_state(), ConnectionState::Error);
    assert_eq!(h.engine.init_calls(), 1);
}

#[tokio::test]
async fn token_failure_moves_to_error_without_engine_call() {
    let h = harness_with_tokens(with_bob(), SimCapture::new(), Arc::new(RejectingTokens));

    let err = h.manager.connect(&h.key, "Random", "alice").await.unwrap_err();

    assert_eq!(
        err,
        SessionError::Token(TokenError::Rejected("quota exceeded".into()))
    );
    assert_eq!(h.manager.current_state(), ConnectionState::Error);
    assert_eq!(h.engine.init_calls(), 0);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.active_session().await.is_none());
}

#[tokio::test]
async fn init_failure_moves_to_error_with_empty_roster() {
    let behavior = SimBehavior {
        fail_init: Some("unreachable gateway".into()),
        ..SimBehavior::default()
    };
    let h = harness(behavior);
    let mut state = h.manager.connection_state();
    assert_eq!(*state.borrow_and_update(), ConnectionState::Disconnected);

    let err = h.manager.connect(&h.key, "Random", "alice").await.unwrap_err();

    assert!(matches!(err, SessionError::SessionInit(ref m) if m.contains("unreachable gateway")));
    assert!(state.has_changed().unwrap());
    assert_eq!(*state.borrow_and_update(), ConnectionState::Error);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.active_session().await.is_none());
}

#[tokio::test]
async fn join_failure_leaves_no_partial_session() {
    let behavior = SimBehavior {
        fail_join: Some("room full".into()),
        ..with_bob()
    };
    let h = harness(behavior);

    let err = h.manager.connect(&h.key, "Random", "alice").await.unwrap_err();
    assert!(matches!(err, SessionError::SessionInit(ref m) if m.contains("room full")));

    let session = h.engine.last_session().unwrap();
    assert_eq!(session.listener_count(), 0);
    assert!(session.is_closed());
    assert_eq!(h.manager.current_state(), ConnectionState::Error);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.media_handles().await.is_empty());
    assert!(h.manager.active_session().await.is_none());
    assert_eq!(h.capture.calls(), 0);
}

#[tokio::test]
async fn media_activity_toggles_talk_flag() {
    let h = harness(with_bob());
    connect_ok(&h).await;
    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(1))).await;

    let session = h.engine.last_session().unwrap();
    session.media_activity(1, 7, true);
    wait_for_roster(&mut roster, |r| r.get(PeerId(1)).is_some_and(|p| p.talking)).await;

    session.media_activity(1, 7, false);
    wait_for_roster(&mut roster, |r| r.get(PeerId(1)).is_some_and(|p| !p.talking)).await;
}

#[tokio::test]
async fn join_immediately_followed_by_leave_leaves_no_entry() {
    let h = harness(SimBehavior::default());
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();

    session.peer_joined(5, "eve");
    session.peer_left(5);
    session.peer_joined(6, "marker");

    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(6))).await;
    assert!(!h.manager.current_roster().contains(PeerId(5)));
}

#[tokio::test]
async fn roster_is_joins_minus_leaves_in_arrival_order() {
    let h = harness(SimBehavior::default());
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();

    session.peer_joined(1, "a");
    session.peer_joined(2, "b");
    session.peer_left(1);
    session.peer_joined(3, "c");
    session.peer_left(9);
    session.peer_joined(1, "a again");
    session.peer_left(2);
    session.peer_joined(100, "marker");

    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(100))).await;
    let snapshot = h.manager.current_roster();
    assert_eq!(snapshot.ids(), vec![PeerId(1), PeerId(3), PeerId(100)]);
    assert_eq!(snapshot.get(PeerId(1)).unwrap().user_name(), "a again");
}

#[tokio::test]
async fn disconnect_without_connect_is_harmless() {
    let h = harness(SimBehavior::default());
    h.manager.disconnect().await;
    h.manager.disconnect().await;

    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
    assert!(h.manager.current_roster().is_empty());
}

#[tokio::test]
async fn disconnect_clears_state_and_roster() {
    let h = harness(with_bob());
    connect_ok(&h).await;
    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(1))).await;
    let session = h.engine.last_session().unwrap();

    h.manager.disconnect().await;

    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.active_session().await.is_none());
    assert!(h.manager.media_handles().await.is_empty());
    assert_eq!(session.listener_count(), 0);
    assert!(session.is_closed());
    assert_eq!(h.engine.disconnect_calls(), 1);

    h.manager.disconnect().await;
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn disconnect_recovers_from_error() {
    let h = harness(SimBehavior::default());
    let _ = h.manager.connect("", "Random", "alice").await;
    assert_eq!(h.manager.current_state(), ConnectionState::Error);

    h.manager.disconnect().await;
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnect_registers_a_single_fresh_listener() {
    let h = harness(SimBehavior::default());
    connect_ok(&h).await;
    let first = h.engine.last_session().unwrap();
    h.manager.disconnect().await;

    connect_ok(&h).await;
    let second = h.engine.last_session().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.peer_joined(40, "ghost"), 0);
    assert_eq!(second.listener_count(), 1);
    assert_eq!(second.listeners_added(), 1);

    second.peer_joined(41, "fresh");
    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(41))).await;
    assert!(!h.manager.current_roster().contains(PeerId(40)));
}

#[tokio::test]
async fn second_connect_while_pending_is_rejected() {
    let behavior = SimBehavior {
        latency: Some(Duration::from_millis(50)),
        ..SimBehavior::default()
    };
    let h = harness(behavior);

    let (first, second) = tokio::join!(h.manager.connect(&h.key, "Random", "alice"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.manager.connect(&h.key, "Random", "mallory").await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), SessionError::ConnectInProgress);
    assert_eq!(h.engine.init_calls(), 1);
}

#[tokio::test]
async fn connect_while_connected_is_rejected() {
    let h = harness(SimBehavior::default());
    connect_ok(&h).await;

    let err = h.manager.connect(&h.key, "Other", "alice").await.unwrap_err();
    assert_eq!(err, SessionError::AlreadyConnected);
    assert_eq!(h.manager.current_state(), ConnectionState::Connected);
    assert_eq!(h.engine.init_calls(), 1);
}

#[tokio::test]
async fn bad_key_does_not_disturb_live_session() {
    let h = harness(SimBehavior::default());
    connect_ok(&h).await;

    let err = h.manager.connect("", "Random", "alice").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidCredential(_)));
    assert_eq!(h.manager.current_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn disconnect_during_init_supersedes_connect() {
    let behavior = SimBehavior {
        latency: Some(Duration::from_millis(50)),
        ..with_bob()
    };
    let h = harness(behavior);

    let (result, ()) = tokio::join!(h.manager.connect(&h.key, "Random", "alice"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.manager.disconnect().await;
    });

    assert_eq!(result.unwrap_err(), SessionError::Superseded);
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.active_session().await.is_none());
    assert_eq!(h.engine.session_count(), 1);
    assert!(h.engine.last_session().unwrap().is_closed());
}

#[tokio::test]
async fn disconnect_before_connect_reaches_engine_supersedes_it() {
    let h = harness(SimBehavior::default());
    // Hold the session slot so connect parks right after taking the gate.
    let slot = h.manager.active.lock().await;

    let (result, (), ()) = tokio::join!(
        h.manager.connect(&h.key, "Random", "alice"),
        async {
            while h.manager.connect_gate.try_lock().is_ok() {
                tokio::task::yield_now().await;
            }
            h.manager.disconnect().await;
        },
        async {
            while h.manager.epoch.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
            drop(slot);
        }
    );

    assert_eq!(result.unwrap_err(), SessionError::Superseded);
    assert_eq!(h.engine.init_calls(), 0);
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
    assert!(h.manager.active_session().await.is_none());
}

#[tokio::test]
async fn disconnect_during_join_tears_down_partial_session() {
    let behavior = SimBehavior {
        latency: Some(Duration::from_millis(40)),
        ..with_bob()
    };
    let h = harness(behavior);

    let (result, ()) = tokio::join!(h.manager.connect(&h.key, "Random", "alice"), async {
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.manager.disconnect().await;
    });

    assert_eq!(result.unwrap_err(), SessionError::Superseded);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);
    assert!(h.manager.current_roster().is_empty());
    assert!(h.manager.active_session().await.is_none());
    assert_eq!(h.capture.calls(), 0);
}

#[tokio::test]
async fn local_media_is_acquired_after_join() {
    let h = harness(SimBehavior::default());
    let mut notices = h.manager.notices();
    let session_id = connect_ok(&h).await;

    let notice = tokio::time::timeout(WAIT, notices.recv()).await.unwrap().unwrap();
    assert!(matches!(
        notice,
        SessionNotice::LocalMediaReady { session_id: ref id, .. } if *id == session_id
    ));

    let local = wait_for_local_media(&h).await;
    assert_eq!(Some(local.peer_id), h.manager.local_peer().await);
    assert_eq!(h.capture.last_constraints(), Some(CaptureConstraints::default()));

    let session = h.engine.last_session().unwrap();
    assert!(session.is_media_active(local.id));
}

#[tokio::test]
async fn disconnect_cancels_pending_microphone_acquisition() {
    let capture = SimCapture::new().with_delay(Duration::from_millis(50));
    let h = harness_with(SimBehavior::default(), capture);
    let mut notices = h.manager.notices();
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();

    h.manager.disconnect().await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert!(matches!(
        notices.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    assert_eq!(session.start_calls(), 0);
}

#[tokio::test]
async fn missing_microphone_is_a_warning_not_an_error() {
    let h = harness_with(with_bob(), SimCapture::failing(CaptureError::NoDevice));
    let mut notices = h.manager.notices();
    connect_ok(&h).await;

    let notice = tokio::time::timeout(WAIT, notices.recv()).await.unwrap().unwrap();
    assert!(matches!(
        notice,
        SessionNotice::DeviceAcquisitionWarning { ref reason, .. } if reason.contains("no audio input")
    ));
    assert_eq!(h.manager.current_state(), ConnectionState::Connected);
    assert!(h.manager.media_handles().await.is_empty());
}

#[tokio::test]
async fn remote_media_start_and_stop_are_idempotent() {
    let behavior = SimBehavior {
        auto_start_local_media: false,
        ..with_bob()
    };
    let h = harness(behavior);
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();
    let mut roster = h.manager.roster();

    session.remote_media_started(50, 1);
    session.remote_media_started(50, 1);
    session.peer_joined(90, "marker-1");
    wait_for_roster(&mut roster, |r| r.contains(PeerId(90))).await;
    assert_eq!(session.start_calls(), 1);
    assert!(session.is_media_active(MediaId(50)));

    session.remote_media_stopped(50, 1);
    session.remote_media_stopped(50, 1);
    session.peer_joined(91, "marker-2");
    wait_for_roster(&mut roster, |r| r.contains(PeerId(91))).await;
    assert_eq!(session.stop_calls(), 1);
    assert!(!session.is_media_active(MediaId(50)));
}

#[tokio::test]
async fn departed_peer_media_is_forgotten() {
    let behavior = SimBehavior {
        auto_start_local_media: false,
        ..with_bob()
    };
    let h = harness(behavior);
    connect_ok(&h).await;
    let session = h.engine.last_session().unwrap();
    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(1))).await;

    session.remote_media_started(50, 1);
    session.peer_left(1);
    wait_for_roster(&mut roster, |r| !r.contains(PeerId(1))).await;

    assert!(h
        .manager
        .media_handles()
        .await
        .iter()
        .all(|m| m.peer_id != PeerId(1)));
}

#[tokio::test]
async fn transport_close_is_disconnected_not_error() {
    let h = harness(with_bob());
    connect_ok(&h).await;
    let mut roster = h.manager.roster();
    wait_for_roster(&mut roster, |r| r.contains(PeerId(1))).await;

    let session = h.engine.last_session().unwrap();
    session.connection_state(EngineConnectionState::Disconnected);

    let mut state = h.manager.connection_state();
    wait_for_state(&mut state, ConnectionState::Disconnected).await;
    wait_for_roster(&mut roster, |r| r.is_empty()).await;
    assert!(h.manager.active_session().await.is_none());

    // A closed session does not block the next connect.
    connect_ok(&h).await;
    assert_eq!(h.engine.init_calls(), 2);
    assert_eq!(session.listener_count(), 0);
}

#[tokio::test]
async fn engine_error_mid_session_moves_to_error() {
    let h = harness(with_bob());
    connect_ok(&h).await;

    let session = h.engine.last_session().unwrap();
    session.connection_state(EngineConnectionState::Error);

    let mut state = h.manager.connection_state();
    wait_for_state(&mut state, ConnectionState::Error).await;
    assert!(h.manager.current_roster().is_empty());
}

#[tokio::test]
async fn state_waits_for_engine_confirmation() {
    let behavior = SimBehavior {
        auto_connect: false,
        ..SimBehavior::default()
    };
    let h = harness(behavior);
    h.manager.connect(&h.key, "Random", "alice").await.unwrap();
    assert_eq!(h.manager.current_state(), ConnectionState::Disconnected);

    let session = h.engine.last_session().unwrap();
    session.connection_state(EngineConnectionState::Connecting);
    session.connection_state(EngineConnectionState::Connected);
    wait_for_state(&mut h.manager.connection_state(), ConnectionState::Connected).await;
}

#[tokio::test]
async fn blank_room_name_uses_default() {
    let h = harness(SimBehavior::default());
    h.manager.connect(&h.key, "  ", "alice").await.unwrap();
    assert_eq!(h.manager.room_name().await.as_deref(), Some("Random"));
}

#[tokio::test]
async fn connect_after_error_starts_over() {
    let h = harness(SimBehavior {
        fail_init: Some("offline".into()),
        ..SimBehavior::default()
    });
    assert!(h.manager.connect(&h.key, "Random", "alice").await.is_err());
    assert_eq!(h.manager.current_state(), ConnectionState::Error);

    h.engine.set_behavior(SimBehavior::default());
    connect_ok(&h).await;
}
