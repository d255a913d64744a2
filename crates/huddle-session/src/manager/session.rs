//! Per-session bookkeeping shared between the manager and its tasks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use huddle_common::SessionId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineSession, ListenerId};
use crate::media::MediaCoordinator;
use crate::roster::PeerId;

/// State shared by the manager, the event pump, and the media task.
pub(crate) struct SessionShared {
    pub(crate) id: SessionId,
    pub(crate) media: Mutex<MediaCoordinator>,
    pub(crate) cancel: CancellationToken,
    own_peer: OnceLock<PeerId>,
    closed: AtomicBool,
}

impl SessionShared {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            media: Mutex::new(MediaCoordinator::new()),
            cancel: CancellationToken::new(),
            own_peer: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn own_peer(&self) -> Option<PeerId> {
        self.own_peer.get().copied()
    }

    pub(crate) fn set_own_peer(&self, peer: PeerId) {
        let _ = self.own_peer.set(peer);
    }

    /// Mark the session over and stop its background tasks.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// The one room session a manager currently owns.
pub(crate) struct ActiveSession {
    pub(crate) room_name: String,
    pub(crate) engine_session: Arc<dyn EngineSession>,
    pub(crate) listener: ListenerId,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) pump: JoinHandle<()>,
}
