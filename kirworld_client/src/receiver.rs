//! Snapshot receiver.
//!
//! Holds the most recent authoritative player list and the local identity.
//! Every `players` push replaces the list wholesale.

use kirworld_shared::{
    chat::ChatMessage,
    net::{EntityId, PlayerState, ServerMsg},
};
use tracing::{debug, info, warn};

/// What an inbound message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// Identity recorded. `changed` is false when the same id was repeated.
    Identity { id: EntityId, changed: bool },
    /// Snapshot replaced; carries the new entity count.
    Snapshot { players: usize },
    /// Chat broadcast for the overlay log.
    Chat(ChatMessage),
}

#[derive(Debug, Default)]
pub struct SnapshotReceiver {
    players: Vec<PlayerState>,
    local_id: Option<EntityId>,
    snapshots: u64,
}

impl SnapshotReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, msg: ServerMsg) -> Received {
        match msg {
            ServerMsg::Joined(identity) => {
                let changed = self.local_id.as_ref() != Some(&identity.id);
                if changed {
                    if let Some(prev) = &self.local_id {
                        warn!(previous = %prev, id = %identity.id, "Identity reassigned");
                    } else {
                        info!(id = %identity.id, "Identity assigned");
                    }
                }
                self.local_id = Some(identity.id.clone());
                Received::Identity {
                    id: identity.id,
                    changed,
                }
            }
            ServerMsg::Players(list) => {
                self.snapshots += 1;
                debug!(seq = self.snapshots, players = list.len(), "Snapshot");
                self.players = list;
                Received::Snapshot {
                    players: self.players.len(),
                }
            }
            ServerMsg::Chat(broadcast) => Received::Chat(broadcast.into()),
        }
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn local_id(&self) -> Option<&EntityId> {
        self.local_id.as_ref()
    }

    /// The local player's authoritative state, once identity and a
    /// snapshot containing it are both known.
    pub fn local_player(&self) -> Option<&PlayerState> {
        let id = self.local_id.as_ref()?;
        find_player(&self.players, id)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }
}

/// Convenience: find a player in a snapshot.
pub fn find_player<'a>(players: &'a [PlayerState], id: &EntityId) -> Option<&'a PlayerState> {
    players.iter().find(|p| p.id == *id)
}
