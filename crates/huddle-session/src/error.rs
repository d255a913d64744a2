use crate::state::ConnectionState;

/// Failures reported by a [`TokenGenerator`](crate::TokenGenerator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token request rejected: {0}")]
    Rejected(String),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Failures reported by the external real-time engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("bad token: {0}")]
    BadToken(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("join refused: {0}")]
    JoinRefused(String),

    #[error("unknown media: {0}")]
    UnknownMedia(String),

    #[error("session closed")]
    Closed,
}

/// Failures acquiring the local microphone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio input device available")]
    NoDevice,

    #[error("capture failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("session init failed: {0}")]
    SessionInit(String),

    #[error("a connect attempt is already in progress")]
    ConnectInProgress,

    #[error("a room session is already active")]
    AlreadyConnected,

    #[error("connect attempt superseded by disconnect")]
    Superseded,

    #[error("invalid connection state transition {from} -> {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },
}

impl From<SessionError> for huddle_common::HuddleError {
    fn from(err: SessionError) -> Self {
        huddle_common::HuddleError::Session(err.to_string())
    }
}
