//! Media handle bookkeeping.
//!
//! Tracks every audio stream the engine has announced and decides when
//! the engine must actually be told to start or stop one. Start and stop
//! are idempotent: repeating either is a no-op.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::engine::MediaRef;
use crate::roster::PeerId;

/// Engine-assigned media stream identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a stream is our own capture or a remote peer's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaOrigin {
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub id: MediaId,
    /// Owning peer, by id only.
    pub peer_id: PeerId,
    pub origin: MediaOrigin,
    pub started: bool,
}

#[derive(Debug, Default)]
pub struct MediaCoordinator {
    handles: BTreeMap<MediaId, MediaHandle>,
    local: Option<MediaId>,
}

impl MediaCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the stream created from our own microphone.
    pub fn register_local(&mut self, id: MediaId, own_peer: PeerId) {
        self.handles.entry(id).or_insert(MediaHandle {
            id,
            peer_id: own_peer,
            origin: MediaOrigin::Local,
            started: false,
        });
        self.local = Some(id);
    }

    /// Mark a stream started. Returns `true` when the engine must be
    /// told to start it.
    pub fn on_started(&mut self, media: &MediaRef) -> bool {
        let handle = self.entry(media);
        if handle.started {
            debug!(media = %media.id, "media already started");
            return false;
        }
        handle.started = true;
        true
    }

    /// Mark a stream stopped. Returns `true` when the engine must be told
    /// to stop it.
    pub fn on_stopped(&mut self, media: &MediaRef) -> bool {
        let handle = self.entry(media);
        if !handle.started {
            debug!(media = %media.id, "media already stopped");
            return false;
        }
        handle.started = false;
        true
    }

    /// Undo a state change the engine refused to apply.
    pub fn set_started(&mut self, id: MediaId, started: bool) {
        if let Some(handle) = self.handles.get_mut(&id) {
            handle.started = started;
        }
    }

    /// Drop every stream owned by a peer that left.
    pub fn forget_peer(&mut self, peer_id: PeerId) -> usize {
        let before = self.handles.len();
        self.handles.retain(|_, h| h.peer_id != peer_id);
        if self.local.is_some_and(|id| !self.handles.contains_key(&id)) {
            self.local = None;
        }
        before - self.handles.len()
    }

    pub fn local(&self) -> Option<&MediaHandle> {
        self.local.and_then(|id| self.handles.get(&id))
    }

    pub fn get(&self, id: MediaId) -> Option<&MediaHandle> {
        self.handles.get(&id)
    }

    pub fn handles(&self) -> Vec<MediaHandle> {
        self.handles.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Remove every handle, returning what was dropped.
    pub fn clear(&mut self) -> Vec<MediaHandle> {
        self.local = None;
        std::mem::take(&mut self.handles).into_values().collect()
    }

    fn entry(&mut self, media: &MediaRef) -> &mut MediaHandle {
        self.handles.entry(media.id).or_insert(MediaHandle {
            id: media.id,
            peer_id: media.peer_id,
            origin: media.origin,
            started: false,
        })
    }
}
