//! Background task that applies engine events to the roster, the state
//! machine, and the media coordinator, strictly in arrival order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{EngineConnectionState, EngineSession, MediaRef, SessionEvent};
use crate::roster::PeerRoster;
use crate::state::StateMachine;

use super::session::SessionShared;

pub(crate) struct PumpContext {
    pub(crate) session: Arc<dyn EngineSession>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) state: Arc<StateMachine>,
    pub(crate) roster: Arc<PeerRoster>,
}

/// Whether the pump keeps running after an event.
enum Flow {
    Continue,
    Closed,
}

pub(crate) async fn run_event_pump(mut rx: mpsc::UnboundedReceiver<SessionEvent>, ctx: PumpContext) {
    let session_id = ctx.shared.id.short().to_string();
    debug!(session = %session_id, "event pump started");

    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.shared.cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        if let Flow::Closed = handle_event(&ctx, event).await {
            break;
        }
    }

    debug!(session = %session_id, "event pump stopped");
}

async fn handle_event(ctx: &PumpContext, event: SessionEvent) -> Flow {
    match event {
        SessionEvent::ConnectionStateChanged { new_state } => {
            return handle_engine_state(ctx, new_state).await;
        }
        SessionEvent::PeerJoined { peer } => {
            info!(peer = %peer.id, name = %peer.user_name(), "peer joined");
            ctx.roster.on_peer_joined(peer);
        }
        SessionEvent::PeerLeft { peer_id } => {
            info!(peer = %peer_id, "peer left");
            ctx.roster.on_peer_left(peer_id);
            let dropped = ctx.shared.media.lock().await.forget_peer(peer_id);
            if dropped > 0 {
                debug!(peer = %peer_id, dropped, "dropped media of departed peer");
            }
        }
        SessionEvent::MediaStarted { media } => start_media(ctx, media).await,
        SessionEvent::MediaStopped { media } => stop_media(ctx, media).await,
        SessionEvent::MediaActivity {
            peer_id,
            media_id,
            active,
        } => {
            if !ctx.roster.set_talking(peer_id, active) && ctx.shared.own_peer() != Some(peer_id) {
                debug!(peer = %peer_id, media = %media_id, "activity for unknown peer");
            }
        }
    }
    Flow::Continue
}

async fn handle_engine_state(ctx: &PumpContext, new_state: EngineConnectionState) -> Flow {
    match new_state {
        EngineConnectionState::Connecting => {
            debug!("engine connecting");
            Flow::Continue
        }
        EngineConnectionState::Connected => {
            ctx.state.mark_engine_live();
            Flow::Continue
        }
        EngineConnectionState::Disconnected => {
            info!("engine closed the session transport");
            close_session(ctx).await;
            ctx.state.reset();
            Flow::Closed
        }
        EngineConnectionState::Error => {
            warn!("engine reported a session error");
            close_session(ctx).await;
            ctx.state.fail();
            Flow::Closed
        }
    }
}

async fn close_session(ctx: &PumpContext) {
    ctx.shared.close();
    ctx.shared.media.lock().await.clear();
    ctx.roster.on_reset();
}

async fn start_media(ctx: &PumpContext, media: MediaRef) {
    if !ctx.shared.media.lock().await.on_started(&media) {
        return;
    }
    match ctx.session.start_media(media.id).await {
        Ok(()) => debug!(media = %media.id, peer = %media.peer_id, origin = ?media.origin, "media started"),
        Err(e) => {
            warn!(media = %media.id, error = %e, "failed to start media");
            ctx.shared.media.lock().await.set_started(media.id, false);
        }
    }
}

async fn stop_media(ctx: &PumpContext, media: MediaRef) {
    if !ctx.shared.media.lock().await.on_stopped(&media) {
        return;
    }
    match ctx.session.stop_media(media.id).await {
        Ok(()) => debug!(media = %media.id, peer = %media.peer_id, "media stopped"),
        Err(e) => {
            warn!(media = %media.id, error = %e, "failed to stop media");
            ctx.shared.media.lock().await.set_started(media.id, true);
        }
    }
}
