//! Peer roster: the set of peers currently known in the room.
//!
//! Every mutation replaces the published snapshot wholesale, so readers
//! holding a [`watch::Receiver`] never observe a half-applied update.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::codec;

/// Engine-assigned peer identifier, stable for the peer's time in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One peer in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: PeerId,
    /// Opaque user data supplied by the peer when it joined.
    pub user_data: Vec<u8>,
    /// Whether the peer's media is currently active.
    pub talking: bool,
}

impl PeerRecord {
    pub fn new(id: PeerId, user_data: Vec<u8>) -> Self {
        Self {
            id,
            user_data,
            talking: false,
        }
    }

    /// Display name decoded from the user data.
    pub fn user_name(&self) -> String {
        codec::decode(&self.user_data)
    }
}

/// Immutable roster snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    peers: BTreeMap<PeerId, PeerRecord>,
}

impl Roster {
    pub fn get(&self, id: PeerId) -> Option<&PeerRecord> {
        self.peers.get(&id)
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Peers in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.peers.values()
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }
}

/// Writer side of the roster. Owned by the session manager.
pub struct PeerRoster {
    tx: watch::Sender<Arc<Roster>>,
}

impl PeerRoster {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Roster::default()));
        Self { tx }
    }

    /// Receiver that yields the current snapshot immediately and every
    /// later one.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Roster>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Roster> {
        Arc::clone(&self.tx.borrow())
    }

    /// Insert a peer, replacing any entry with the same id.
    pub fn on_peer_joined(&self, peer: PeerRecord) {
        self.publish(|peers| {
            if let Some(previous) = peers.insert(peer.id, peer) {
                debug!(peer = %previous.id, "replaced existing roster entry");
            }
        });
    }

    /// Remove a peer. Unknown ids are ignored.
    pub fn on_peer_left(&self, peer_id: PeerId) {
        self.publish(|peers| {
            if peers.remove(&peer_id).is_none() {
                debug!(peer = %peer_id, "peer left but was not in roster");
            }
        });
    }

    pub fn on_reset(&self) {
        self.publish(BTreeMap::clear);
    }

    /// Update a peer's talk flag. Returns `false` for unknown peers, in
    /// which case nothing is published.
    pub fn set_talking(&self, peer_id: PeerId, talking: bool) -> bool {
        let mut known = false;
        self.tx.send_if_modified(|snapshot| {
            let Some(current) = snapshot.get(peer_id) else {
                return false;
            };
            known = true;
            if current.talking == talking {
                return false;
            }
            let mut next = Roster::clone(snapshot);
            if let Some(peer) = next.peers.get_mut(&peer_id) {
                peer.talking = talking;
            }
            *snapshot = Arc::new(next);
            true
        });
        known
    }

    fn publish(&self, mutate: impl FnOnce(&mut BTreeMap<PeerId, PeerRecord>)) {
        self.tx.send_modify(|snapshot| {
            let mut next = Roster::clone(snapshot);
            mutate(&mut next.peers);
            *snapshot = Arc::new(next);
        });
    }
}

impl Default for PeerRoster {
    fn default() -> Self {
        Self::new()
    }
}
