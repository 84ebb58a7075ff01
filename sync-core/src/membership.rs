//! Room membership tracking for roomsync.
//!
//! This module keeps the local view of who is in the room, driven by the
//! transport's presence events:
//! - `sync` carries the authoritative snapshot and rebuilds the view
//! - `join` merges new presence records
//! - `leave` removes peers
//!
//! The local peer is always part of its own view, even when a snapshot
//! momentarily lacks it because of propagation delay.

use roomsync_types::{Peer, PeerId, PresenceRecord};
use std::collections::BTreeMap;

/// A presence change reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// Authoritative snapshot of every tracked presence.
    Sync(Vec<PresenceRecord>),
    /// Newly published presence records.
    Join(Vec<PresenceRecord>),
    /// Peers whose presence went away.
    Leave(Vec<PeerId>),
}

/// Side effects requested by the membership tracker, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipAction {
    /// Notify membership observers with the current peer list.
    MembersChanged(Vec<Peer>),
    /// Notify connection-status observers with the current peer count.
    StatusChanged {
        /// Peers in the room, including the local one.
        peer_count: usize,
    },
    /// Offer the local state to a newly joined peer.
    OfferState {
        /// The joiner.
        to: PeerId,
    },
}

/// Local view of room membership.
#[derive(Debug, Clone)]
pub struct RoomMembership {
    local: Peer,
    peers: BTreeMap<PeerId, Peer>,
}

impl RoomMembership {
    /// Create a view containing only the local peer.
    pub fn new(local: Peer) -> Self {
        let mut peers = BTreeMap::new();
        peers.insert(local.id.clone(), local.clone());
        Self { local, peers }
    }

    /// Apply a presence change.
    ///
    /// `holds_state` tells the tracker whether the local provider can serve
    /// state to joiners. Returns the side effects to run, in order.
    pub fn on_presence(&mut self, change: PresenceChange, holds_state: bool) -> Vec<MembershipAction> {
        let mut offers = Vec::new();

        match change {
            PresenceChange::Sync(records) => {
                self.peers.clear();
                for record in records {
                    self.peers.insert(record.player.id.clone(), record.player);
                }
                self.peers.insert(self.local.id.clone(), self.local.clone());
            }
            PresenceChange::Join(records) => {
                for record in records {
                    let id = record.player.id.clone();
                    if id == self.local.id {
                        continue;
                    }
                    self.peers.insert(id.clone(), record.player);
                    if holds_state && !offers.contains(&id) {
                        offers.push(id);
                    }
                }
            }
            PresenceChange::Leave(ids) => {
                for id in ids {
                    if id != self.local.id {
                        self.peers.remove(&id);
                    }
                }
            }
        }

        let mut actions = vec![
            MembershipAction::MembersChanged(self.peers()),
            MembershipAction::StatusChanged {
                peer_count: self.peer_count(),
            },
        ];
        actions.extend(offers.into_iter().map(|to| MembershipAction::OfferState { to }));
        actions
    }

    /// All peers, oldest join first.
    pub fn peers(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.id.cmp(&b.id)));
        peers
    }

    /// Number of peers, including the local one.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Number of peers other than the local one.
    pub fn remote_count(&self) -> usize {
        self.peers.len().saturating_sub(1)
    }

    /// Check if a peer is in the room.
    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    /// Look up a peer.
    pub fn get(&self, id: &PeerId) -> Option<&Peer> {
        self.peers.get(id)
    }

    /// The local peer.
    pub fn local(&self) -> &Peer {
        &self.local
    }
}
