//! Seams to the external real-time engine.
//!
//! The engine encodes, transmits, and decodes audio. This crate drives it
//! through [`RoomEngine`] (one per client process) and [`EngineSession`]
//! (one per joined room), and reacts to the [`SessionEvent`]s it emits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::capture::CaptureStream;
use crate::error::EngineError;
use crate::media::{MediaId, MediaOrigin};
use crate::roster::{PeerId, PeerRecord};
use crate::token::Token;

/// Connection state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// A media stream referenced by an engine event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRef {
    pub id: MediaId,
    pub peer_id: PeerId,
    pub origin: MediaOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ConnectionStateChanged { new_state: EngineConnectionState },
    PeerJoined { peer: PeerRecord },
    PeerLeft { peer_id: PeerId },
    MediaStarted { media: MediaRef },
    MediaStopped { media: MediaRef },
    /// Voice activity on one of a peer's media streams.
    MediaActivity {
        peer_id: PeerId,
        media_id: MediaId,
        active: bool,
    },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// Handle returned by [`EngineSession::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// One initialised room session inside the engine.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Register an event listener. Events emitted before registration are
    /// not replayed.
    fn add_listener(&self, tx: EventSender) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);

    /// Join the room with opaque user data. Returns the local peer id.
    async fn join(&self, user_data: &[u8]) -> Result<PeerId, EngineError>;

    /// Register a local capture stream for transmission.
    async fn create_media(&self, stream: CaptureStream) -> Result<MediaId, EngineError>;

    /// Enable transmit (local media) or playback (remote media).
    async fn start_media(&self, id: MediaId) -> Result<(), EngineError>;

    async fn stop_media(&self, id: MediaId) -> Result<(), EngineError>;
}

/// Client-lifetime engine object.
#[async_trait]
pub trait RoomEngine: Send + Sync {
    async fn init_session(&self, token: &Token) -> Result<Arc<dyn EngineSession>, EngineError>;

    /// Tear down every session this client holds.
    async fn disconnect_all(&self);
}
