//! Peer adjacency graph guarded by one process-wide reader/writer lock.

use std::collections::HashMap;

use parking_lot::RwLock;
use rendez_types::{PeerAddr, PeerProfile};
use tracing::{debug, info};

/// The authoritative peer adjacency graph.
///
/// Adjacency is recorded as an edge list inside each profile rather than as
/// a separate undirected edge set. Enroll writes both edge directions under
/// a single acquisition of the exclusive lock, so a query from either side
/// of an edge observes the adjacency; remove prunes the reverse edges under
/// the same discipline. Snapshot takes the shared lock and returns a
/// detached copy.
#[derive(Debug, Default)]
pub struct Topology {
    peers: RwLock<HashMap<PeerAddr, PeerProfile>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `profile` under its address and appends the back-edge to
    /// every declared neighbor, synthesizing an empty record for any
    /// neighbor never seen before.
    ///
    /// Overwrites a previous record for the same address; never fails. Not
    /// idempotent: enrolling the same profile again appends duplicate
    /// back-edges to its neighbors.
    pub fn enroll(&self, profile: PeerProfile) {
        let addr = profile.addr.clone();
        let neighbors = profile.neighbors.clone();

        let mut peers = self.peers.write();
        peers.insert(addr.clone(), profile);
        for neighbor in &neighbors {
            let entry = peers
                .entry(neighbor.clone())
                .or_insert_with(|| PeerProfile::placeholder(neighbor.clone()));
            entry.neighbors.push(addr.clone());
        }
        drop(peers);

        info!(peer = %addr, neighbors = neighbors.len(), "Enrolled peer");
    }

    /// Unregisters a peer: prunes the first occurrence of `profile.addr`
    /// from each declared neighbor's edge list, drops any neighbor record
    /// that becomes neighborless, and finally deletes the peer's own
    /// record. Removing a peer that was never enrolled is a no-op.
    pub fn remove(&self, profile: &PeerProfile) {
        let mut peers = self.peers.write();
        for neighbor in &profile.neighbors {
            let Some(entry) = peers.get_mut(neighbor) else {
                debug!(peer = %profile.addr, neighbor = %neighbor, "No record to prune");
                continue;
            };
            if let Some(pos) = entry.neighbors.iter().position(|n| n == &profile.addr) {
                entry.neighbors.remove(pos);
                if entry.neighbors.is_empty() {
                    peers.remove(neighbor);
                }
            }
        }
        peers.remove(&profile.addr);
        drop(peers);

        info!(peer = %profile.addr, "Removed peer");
    }

    /// Detached copy of the whole graph.
    pub fn snapshot(&self) -> HashMap<PeerAddr, PeerProfile> {
        self.peers.read().clone()
    }

    /// Record for a single address, if present.
    pub fn get(&self, addr: &str) -> Option<PeerProfile> {
        self.peers.read().get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}
