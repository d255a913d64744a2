//! Connection state machine for one room session.
//!
//! `Disconnected -> Connected` requires both the engine's "live" report
//! and a completed join handshake, in either order. `Error` is terminal
//! for an attempt and is only left by a new attempt or an explicit
//! disconnect.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::SessionError;

/// Session lifecycle as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Whether `from -> to` is a legal transition.
fn is_allowed(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    matches!(
        (from, to),
        (Disconnected, Connected)
            | (Connected, Disconnected)
            | (Disconnected, Disconnected)
            | (Error, Disconnected)
            | (_, Error)
    )
}

pub struct StateMachine {
    tx: watch::Sender<ConnectionState>,
    engine_live: AtomicBool,
    joined: AtomicBool,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            tx,
            engine_live: AtomicBool::new(false),
            joined: AtomicBool::new(false),
        }
    }

    /// Receiver that yields the current state immediately and every
    /// later transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Apply a transition and publish it.
    ///
    /// `Connected -> Connected` is accepted without publishing.
    pub fn transition(&self, to: ConnectionState) -> Result<(), SessionError> {
        let mut result = Ok(());
        self.tx.send_if_modified(|state| {
            let from = *state;
            if from == ConnectionState::Connected && to == ConnectionState::Connected {
                return false;
            }
            if !is_allowed(from, to) {
                warn!(%from, %to, "rejected connection state transition");
                result = Err(SessionError::InvalidTransition { from, to });
                return false;
            }
            debug!(%from, %to, "connection state transition");
            *state = to;
            true
        });
        result
    }

    /// Start a new connect attempt, leaving any previous `Error`.
    pub fn begin_attempt(&self) {
        self.clear_progress();
        if self.current() == ConnectionState::Error {
            let _ = self.transition(ConnectionState::Disconnected);
        }
    }

    /// The engine reported the session live.
    pub fn mark_engine_live(&self) {
        self.engine_live.store(true, Ordering::SeqCst);
        self.try_connect();
    }

    /// The join handshake completed.
    pub fn mark_joined(&self) {
        self.joined.store(true, Ordering::SeqCst);
        self.try_connect();
    }

    /// Move to `Error`. Always legal.
    pub fn fail(&self) {
        self.clear_progress();
        let _ = self.transition(ConnectionState::Error);
    }

    /// Move to `Disconnected` from any state.
    pub fn reset(&self) {
        self.clear_progress();
        let _ = self.transition(ConnectionState::Disconnected);
    }

    fn clear_progress(&self) {
        self.engine_live.store(false, Ordering::SeqCst);
        self.joined.store(false, Ordering::SeqCst);
    }

    fn try_connect(&self) {
        // Both flags are read under the watch lock so that whichever
        // marker runs second observes the other.
        self.tx.send_if_modified(|state| {
            let ready =
                self.engine_live.load(Ordering::SeqCst) && self.joined.load(Ordering::SeqCst);
            if !ready || *state != ConnectionState::Disconnected {
                return false;
            }
            info!("room session connected");
            *state = ConnectionState::Connected;
            true
        });
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
