//! Room session management for shared voice rooms.
//!
//! Owns the connection lifecycle, the peer roster, and media-stream
//! coordination for a single active room session. Audio transport and
//! token signing belong to an external engine reached through the
//! [`RoomEngine`] and [`TokenGenerator`] traits; this crate only handles
//! the coordination layer.

pub mod capture;
pub mod codec;
pub mod engine;
pub mod error;
pub mod manager;
pub mod media;
pub mod roster;
pub mod sim;
pub mod state;
pub mod token;

pub use capture::{AudioCapture, CaptureConstraints, CaptureStream};
pub use engine::{
    EngineConnectionState, EngineSession, EventSender, ListenerId, MediaRef, RoomEngine,
    SessionEvent,
};
pub use error::{CaptureError, EngineError, SessionError, TokenError};
pub use manager::{ManagerConfig, RoomSessionManager, SessionNotice};
pub use media::{MediaCoordinator, MediaHandle, MediaId, MediaOrigin};
pub use roster::{PeerId, PeerRecord, PeerRoster, Roster};
pub use state::{ConnectionState, StateMachine};
pub use token::{request_token, AccessKey, LocalTokenGenerator, Token, TokenClaims, TokenGenerator};
