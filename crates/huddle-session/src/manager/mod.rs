//! Room session manager: connect, disconnect, and the observable state
//! of the single active room session.
//!
//! Engine events are applied by a per-session pump task (see `pump`).
//! `connect` registers that pump's listener before joining so peers
//! already in the room are not missed.

mod pump;
mod session;
mod types;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use huddle_common::SessionId;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::capture::AudioCapture;
use crate::codec;
use crate::engine::{EngineSession, RoomEngine};
use crate::error::SessionError;
use crate::media::MediaHandle;
use crate::roster::{PeerId, PeerRoster, Roster};
use crate::state::{ConnectionState, StateMachine};
use crate::token::{request_token, AccessKey, TokenGenerator};

use pump::{run_event_pump, PumpContext};
use session::{ActiveSession, SessionShared};

pub use types::{ManagerConfig, SessionNotice};

pub struct RoomSessionManager {
    config: ManagerConfig,
    engine: Arc<dyn RoomEngine>,
    tokens: Arc<dyn TokenGenerator>,
    capture: Arc<dyn AudioCapture>,
    state: Arc<StateMachine>,
    roster: Arc<PeerRoster>,
    notices: broadcast::Sender<SessionNotice>,
    active: Mutex<Option<ActiveSession>>,
    /// Held for the whole of a `connect` call.
    connect_gate: Mutex<()>,
    /// Bumped by every `disconnect`; a pending `connect` that sees it
    /// change gives up.
    epoch: AtomicU64,
}

impl RoomSessionManager {
    pub fn new(
        config: ManagerConfig,
        engine: Arc<dyn RoomEngine>,
        tokens: Arc<dyn TokenGenerator>,
        capture: Arc<dyn AudioCapture>,
    ) -> Self {
        let (notices, _) = broadcast::channel(config.notice_capacity.max(1));
        Self {
            config,
            engine,
            tokens,
            capture,
            state: Arc::new(StateMachine::new()),
            roster: Arc::new(PeerRoster::new()),
            notices,
            active: Mutex::new(None),
            connect_gate: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current connection state, replayed on subscribe.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Current roster snapshot, replayed on subscribe.
    pub fn roster(&self) -> watch::Receiver<Arc<Roster>> {
        self.roster.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.current()
    }

    pub fn current_roster(&self) -> Arc<Roster> {
        self.roster.snapshot()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    pub async fn active_session(&self) -> Option<SessionId> {
        self.live_session(|active| active.shared.id.clone()).await
    }

    pub async fn room_name(&self) -> Option<String> {
        self.live_session(|active| active.room_name.clone()).await
    }

    /// Our own peer id in the active session, once joined.
    pub async fn local_peer(&self) -> Option<PeerId> {
        let shared = self.live_session(|active| Arc::clone(&active.shared)).await?;
        shared.own_peer()
    }

    pub async fn media_handles(&self) -> Vec<MediaHandle> {
        match self.live_session(|active| Arc::clone(&active.shared)).await {
            Some(shared) => shared.media.lock().await.handles(),
            None => Vec::new(),
        }
    }

    /// The local microphone handle, once registered.
    pub async fn local_media(&self) -> Option<MediaHandle> {
        let shared = self.live_session(|active| Arc::clone(&active.shared)).await?;
        let media = shared.media.lock().await;
        media.local().cloned()
    }

    /// Join `room_name` as `user_name`.
    ///
    /// A blank room name falls back to the configured default. Every
    /// failure leaves the state at `Error` with an empty roster, except
    /// [`SessionError::ConnectInProgress`], [`SessionError::AlreadyConnected`]
    /// and [`SessionError::Superseded`], which leave state untouched.
    pub async fn connect(
        &self,
        access_key: &str,
        room_name: &str,
        user_name: &str,
    ) -> Result<SessionId, SessionError> {
        if let Err(e) = AccessKey::parse(access_key) {
            warn!(error = %e, "connect rejected");
            // A bad key must not knock a live or pending session into Error.
            let idle = self.connect_gate.try_lock().is_ok()
                && self.active_session().await.is_none();
            if idle {
                self.state.begin_attempt();
                self.state.fail();
            }
            return Err(e);
        }

        let _gate = self
            .connect_gate
            .try_lock()
            .map_err(|_| SessionError::ConnectInProgress)?;
        // Read before the first await so a racing disconnect is seen.
        let epoch = self.epoch.load(Ordering::SeqCst);

        self.reap_closed_session().await;
        if self.active.lock().await.is_some() {
            return Err(SessionError::AlreadyConnected);
        }
        if self.superseded(epoch) {
            return Err(SessionError::Superseded);
        }

        self.state.begin_attempt();

        let room_name = match room_name.trim() {
            "" => self.config.default_room_name.as_str(),
            name => name,
        };

        let token = match request_token(self.tokens.as_ref(), access_key, room_name, user_name) {
            Ok(token) => token,
            Err(e) => {
                warn!(room = room_name, error = %e, "token request failed");
                self.state.fail();
                return Err(e);
            }
        };

        info!(room = room_name, user = user_name, "connecting to room");
        let engine_session = match self.engine.init_session(&token).await {
            Ok(session) => session,
            Err(e) => {
                if self.superseded(epoch) {
                    return Err(SessionError::Superseded);
                }
                warn!(room = room_name, error = %e, "room initialization failed");
                self.state.fail();
                return Err(SessionError::SessionInit(format!(
                    "room initialization failed: {e}"
                )));
            }
        };
        if self.superseded(epoch) {
            self.engine.disconnect_all().await;
            return Err(SessionError::Superseded);
        }

        let shared = Arc::new(SessionShared::new(SessionId::new()));
        let session_id = shared.id.clone();

        // Listener first, join second.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let listener = engine_session.add_listener(event_tx);
        let pump = tokio::spawn(run_event_pump(
            event_rx,
            PumpContext {
                session: Arc::clone(&engine_session),
                shared: Arc::clone(&shared),
                state: Arc::clone(&self.state),
                roster: Arc::clone(&self.roster),
            },
        ));
        *self.active.lock().await = Some(ActiveSession {
            room_name: room_name.to_string(),
            engine_session: Arc::clone(&engine_session),
            listener,
            shared: Arc::clone(&shared),
            pump,
        });

        let joined = engine_session.join(&codec::encode(user_name)).await;
        if self.superseded(epoch) {
            if let Some(active) = self.active.lock().await.take() {
                self.teardown(active).await;
            }
            return Err(SessionError::Superseded);
        }

        let own_peer = match joined {
            Ok(peer) if !shared.is_closed() => peer,
            Ok(_) => {
                return Err(self
                    .abort_attempt("transport closed during join".into())
                    .await)
            }
            Err(e) => return Err(self.abort_attempt(format!("join failed: {e}")).await),
        };

        shared.set_own_peer(own_peer);
        self.state.mark_joined();
        info!(session = %session_id.short(), room = room_name, peer = %own_peer, "joined room");

        self.spawn_local_media(engine_session, shared);
        Ok(session_id)
    }

    /// Leave the room and reset all observable state.
    ///
    /// Idempotent, and safe to call while a `connect` is still pending.
    pub async fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let active = self.active.lock().await.take();
        if let Some(active) = active {
            let session_id = active.shared.id.clone();
            self.teardown(active).await;
            info!(session = %session_id.short(), "left room");
        } else {
            debug!("disconnect with no active session");
        }

        self.engine.disconnect_all().await;
        self.roster.on_reset();
        self.state.reset();
    }

    /// Undo a failed attempt and move to `Error`.
    async fn abort_attempt(&self, reason: String) -> SessionError {
        warn!(reason = %reason, "connect failed");
        if let Some(active) = self.active.lock().await.take() {
            self.teardown(active).await;
        }
        self.engine.disconnect_all().await;
        self.roster.on_reset();
        self.state.fail();
        SessionError::SessionInit(reason)
    }

    /// Stop the pump, deregister the listener, and drop media handles.
    async fn teardown(&self, active: ActiveSession) {
        let ActiveSession {
            engine_session,
            listener,
            shared,
            pump,
            ..
        } = active;

        shared.close();
        pump.abort();
        if let Err(e) = pump.await {
            if !e.is_cancelled() {
                warn!(error = %e, "event pump ended abnormally");
            }
        }
        engine_session.remove_listener(listener);

        let dropped = shared.media.lock().await.clear();
        debug!(session = %shared.id.short(), media = dropped.len(), "session torn down");
    }

    /// Drop a session the engine already closed.
    async fn reap_closed_session(&self) {
        let closed = {
            let mut slot = self.active.lock().await;
            if slot.as_ref().is_some_and(|a| a.shared.is_closed()) {
                slot.take()
            } else {
                None
            }
        };
        if let Some(active) = closed {
            self.teardown(active).await;
        }
    }

    async fn live_session<T>(&self, f: impl FnOnce(&ActiveSession) -> T) -> Option<T> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|active| !active.shared.is_closed())
            .map(f)
    }

    fn superseded(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) != epoch
    }

    /// Open the microphone in the background. Failure leaves the session
    /// in listen-only mode.
    fn spawn_local_media(&self, engine_session: Arc<dyn EngineSession>, shared: Arc<SessionShared>) {
        let capture = Arc::clone(&self.capture);
        let constraints = self.config.capture;
        let notices = self.notices.clone();

        tokio::spawn(async move {
            let acquired = tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => return,
                result = capture.acquire(&constraints) => result,
            };

            let stream = match acquired {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "microphone unavailable, continuing listen-only");
                    let _ = notices.send(SessionNotice::DeviceAcquisitionWarning {
                        session_id: shared.id.clone(),
                        reason: e.to_string(),
                    });
                    return;
                }
            };
            if shared.cancel.is_cancelled() {
                return;
            }

            match engine_session.create_media(stream).await {
                Ok(media_id) => {
                    if shared.cancel.is_cancelled() {
                        return;
                    }
                    if let Some(own_peer) = shared.own_peer() {
                        shared.media.lock().await.register_local(media_id, own_peer);
                    }
                    info!(media = %media_id, "local microphone registered");
                    let _ = notices.send(SessionNotice::LocalMediaReady {
                        session_id: shared.id.clone(),
                        media_id,
                    });
                }
                Err(e) => {
                    warn!(error = %e, "engine rejected local media, continuing listen-only");
                    let _ = notices.send(SessionNotice::DeviceAcquisitionWarning {
                        session_id: shared.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        });
    }
}
