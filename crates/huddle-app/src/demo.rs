//! Walk a [`RoomSessionManager`] through a short session against the
//! simulated engine, printing what an observer would see.

use std::sync::Arc;
use std::time::Duration;

use huddle_common::HuddleError;
use huddle_config::HuddleConfig;
use huddle_session::sim::{SimBehavior, SimCapture, SimEngine};
use huddle_session::{
    AccessKey, CaptureError, ConnectionState, LocalTokenGenerator, ManagerConfig, PeerId,
    RoomEngine, RoomSessionManager, Roster, SessionNotice,
};
use tokio::sync::watch;

use crate::cli::DemoArgs;

const SETTLE: Duration = Duration::from_secs(5);

pub async fn run(config: &HuddleConfig, args: &DemoArgs) -> Result<(), HuddleError> {
    let behavior = SimBehavior {
        present_peers: args
            .peers
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u64 + 1, name.clone()))
            .collect(),
        ..SimBehavior::default()
    };
    let engine = Arc::new(SimEngine::new(behavior));
    let capture = if args.no_mic {
        SimCapture::failing(CaptureError::NoDevice)
    } else {
        SimCapture::new()
    };
    let manager = RoomSessionManager::new(
        ManagerConfig::from(config),
        Arc::clone(&engine) as Arc<dyn RoomEngine>,
        Arc::new(LocalTokenGenerator::from_config(&config.token)),
        Arc::new(capture),
    );

    let mut state = manager.connection_state();
    let mut roster = manager.roster();
    let mut notices = manager.notices();

    let key = match &args.key {
        Some(key) => key.clone(),
        None => AccessKey::generate().as_str().to_string(),
    };
    let session_id = manager.connect(&key, &args.room, &args.user).await?;
    wait_until(&mut state, "the room to connect", |s| {
        *s == ConnectionState::Connected
    })
    .await?;

    let room = manager.room_name().await.unwrap_or_default();
    println!("joined {room} as {} (session {})", args.user, session_id.short());
    wait_until(&mut roster, "the roster", |r| r.len() >= args.peers.len()).await?;
    print_roster(&manager.current_roster());

    match tokio::time::timeout(SETTLE, notices.recv()).await {
        Ok(Ok(SessionNotice::LocalMediaReady { media_id, .. })) => {
            match manager.local_media().await {
                Some(local) => {
                    println!("microphone live (media {}, peer {})", local.id, local.peer_id);
                }
                None => println!("microphone live (media {media_id})"),
            }
        }
        Ok(Ok(SessionNotice::DeviceAcquisitionWarning { reason, .. })) => {
            println!("listen-only: {reason}");
        }
        Ok(Err(e)) => tracing::warn!(error = %e, "notice stream ended"),
        Err(_) => tracing::warn!("no media notice before timeout"),
    }

    if let Some(session) = engine.last_session() {
        let speaker = manager.current_roster().ids().first().copied();
        if let Some(PeerId(peer)) = speaker {
            session.media_activity(peer, 1, true);
            wait_until(&mut roster, "activity", |r| {
                r.get(PeerId(peer)).is_some_and(|p| p.talking)
            })
            .await?;
            print_roster(&manager.current_roster());
            session.media_activity(peer, 1, false);
        }

        let latecomer = args.peers.len() as u64 + 1;
        session.peer_joined(latecomer, "latecomer");
        wait_until(&mut roster, "the latecomer", |r| r.contains(PeerId(latecomer))).await?;
        print_roster(&manager.current_roster());
    }

    manager.disconnect().await;
    println!("state: {}", manager.current_state());
    Ok(())
}

async fn wait_until<T>(
    rx: &mut watch::Receiver<T>,
    what: &str,
    pred: impl FnMut(&T) -> bool,
) -> Result<(), HuddleError> {
    match tokio::time::timeout(SETTLE, rx.wait_for(pred)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(HuddleError::Session(format!(
            "stopped waiting for {what}: manager dropped"
        ))),
        Err(_) => Err(HuddleError::Session(format!("timed out waiting for {what}"))),
    }
}

fn print_roster(roster: &Roster) {
    println!("roster ({} peers):", roster.len());
    for peer in roster.iter() {
        let marker = if peer.talking { " (talking)" } else { "" };
        println!("  {} {}{marker}", peer.id, peer.user_name());
    }
}
