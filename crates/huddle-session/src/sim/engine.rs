use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::capture::CaptureStream;
use crate::codec;
use crate::engine::{
    EngineConnectionState, EngineSession, EventSender, ListenerId, MediaRef, RoomEngine,
    SessionEvent,
};
use crate::error::EngineError;
use crate::media::{MediaId, MediaOrigin};
use crate::roster::{PeerId, PeerRecord};
use crate::token::Token;

use super::lock;

/// How the simulated engine responds.
#[derive(Debug, Clone)]
pub struct SimBehavior {
    /// Fail `init_session` with this network error.
    pub fail_init: Option<String>,
    /// Fail `join` with this reason.
    pub fail_join: Option<String>,
    /// Report `Connected` during the join handshake.
    pub auto_connect: bool,
    /// Peers already in the room, announced during the join handshake.
    pub present_peers: Vec<(u64, String)>,
    /// Id assigned to the local peer.
    pub own_peer_id: u64,
    /// Emit `MediaStarted` for local media right after `create_media`.
    pub auto_start_local_media: bool,
    /// Artificial latency for `init_session` and `join`.
    pub latency: Option<Duration>,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            fail_init: None,
            fail_join: None,
            auto_connect: true,
            present_peers: Vec::new(),
            own_peer_id: 1000,
            auto_start_local_media: true,
            latency: None,
        }
    }
}

/// Simulated client-lifetime engine.
pub struct SimEngine {
    behavior: Mutex<SimBehavior>,
    sessions: Mutex<Vec<Arc<SimSession>>>,
    init_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl SimEngine {
    pub fn new(behavior: SimBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            sessions: Mutex::new(Vec::new()),
            init_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: SimBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// The most recently initialised session, open or closed.
    pub fn last_session(&self) -> Option<Arc<SimSession>> {
        lock(&self.sessions).last().cloned()
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new(SimBehavior::default())
    }
}

#[async_trait]
impl RoomEngine for SimEngine {
    async fn init_session(&self, token: &Token) -> Result<Arc<dyn EngineSession>, EngineError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = lock(&self.behavior).clone();
        if let Some(latency) = behavior.latency {
            tokio::time::sleep(latency).await;
        }
        if token.as_str().is_empty() {
            return Err(EngineError::BadToken("empty token".into()));
        }
        if let Some(reason) = &behavior.fail_init {
            return Err(EngineError::Network(reason.clone()));
        }

        let session = Arc::new(SimSession::new(behavior));
        lock(&self.sessions).push(Arc::clone(&session));
        Ok(session)
    }

    async fn disconnect_all(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        for session in lock(&self.sessions).iter() {
            session.close();
        }
    }
}

/// One simulated room session.
pub struct SimSession {
    behavior: SimBehavior,
    listeners: Mutex<BTreeMap<u64, EventSender>>,
    next_listener: AtomicU64,
    next_media: AtomicU64,
    active_media: Mutex<BTreeSet<MediaId>>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    listeners_added: AtomicUsize,
    closed: Mutex<bool>,
}

impl SimSession {
    fn new(behavior: SimBehavior) -> Self {
        Self {
            behavior,
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(1),
            next_media: AtomicU64::new(1),
            active_media: Mutex::new(BTreeSet::new()),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            listeners_added: AtomicUsize::new(0),
            closed: Mutex::new(false),
        }
    }

    /// Deliver an event to every registered listener. Returns how many
    /// listeners received it.
    pub fn emit(&self, event: SessionEvent) -> usize {
        let listeners = lock(&self.listeners);
        listeners
            .values()
            .filter(|tx| tx.send(event.clone()).is_ok())
            .count()
    }

    pub fn peer_joined(&self, id: u64, name: &str) -> usize {
        self.emit(SessionEvent::PeerJoined {
            peer: PeerRecord::new(PeerId(id), codec::encode(name)),
        })
    }

    pub fn peer_left(&self, id: u64) -> usize {
        self.emit(SessionEvent::PeerLeft {
            peer_id: PeerId(id),
        })
    }

    pub fn connection_state(&self, new_state: EngineConnectionState) -> usize {
        self.emit(SessionEvent::ConnectionStateChanged { new_state })
    }

    pub fn remote_media_started(&self, media_id: u64, peer_id: u64) -> usize {
        self.emit(SessionEvent::MediaStarted {
            media: MediaRef {
                id: MediaId(media_id),
                peer_id: PeerId(peer_id),
                origin: MediaOrigin::Remote,
            },
        })
    }

    pub fn remote_media_stopped(&self, media_id: u64, peer_id: u64) -> usize {
        self.emit(SessionEvent::MediaStopped {
            media: MediaRef {
                id: MediaId(media_id),
                peer_id: PeerId(peer_id),
                origin: MediaOrigin::Remote,
            },
        })
    }

    pub fn media_activity(&self, peer_id: u64, media_id: u64, active: bool) -> usize {
        self.emit(SessionEvent::MediaActivity {
            peer_id: PeerId(peer_id),
            media_id: MediaId(media_id),
            active,
        })
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Total listeners ever registered on this session.
    pub fn listeners_added(&self) -> usize {
        self.listeners_added.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn is_media_active(&self, id: MediaId) -> bool {
        lock(&self.active_media).contains(&id)
    }

    pub fn is_closed(&self) -> bool {
        *lock(&self.closed)
    }

    fn own_peer(&self) -> PeerId {
        PeerId(self.behavior.own_peer_id)
    }

    fn close(&self) {
        *lock(&self.closed) = true;
        lock(&self.active_media).clear();
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EngineSession for SimSession {
    fn add_listener(&self, tx: EventSender) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        lock(&self.listeners).insert(id, tx);
        self.listeners_added.fetch_add(1, Ordering::SeqCst);
        ListenerId(id)
    }

    fn remove_listener(&self, id: ListenerId) {
        lock(&self.listeners).remove(&id.0);
    }

    async fn join(&self, user_data: &[u8]) -> Result<PeerId, EngineError> {
        self.ensure_open()?;
        if let Some(latency) = self.behavior.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(reason) = &self.behavior.fail_join {
            return Err(EngineError::JoinRefused(reason.clone()));
        }

        debug!(user = %codec::decode(user_data), "sim join");
        if self.behavior.auto_connect {
            self.connection_state(EngineConnectionState::Connected);
        }
        for (id, name) in &self.behavior.present_peers {
            self.peer_joined(*id, name);
        }
        Ok(self.own_peer())
    }

    async fn create_media(&self, _stream: CaptureStream) -> Result<MediaId, EngineError> {
        self.ensure_open()?;
        let id = MediaId(self.next_media.fetch_add(1, Ordering::SeqCst));
        if self.behavior.auto_start_local_media {
            self.emit(SessionEvent::MediaStarted {
                media: MediaRef {
                    id,
                    peer_id: self.own_peer(),
                    origin: MediaOrigin::Local,
                },
            });
        }
        Ok(id)
    }

    async fn start_media(&self, id: MediaId) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.active_media).insert(id);
        Ok(())
    }

    async fn stop_media(&self, id: MediaId) -> Result<(), EngineError> {
        self.ensure_open()?;
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.active_media).remove(&id);
        Ok(())
    }
}
