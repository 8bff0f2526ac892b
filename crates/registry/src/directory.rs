//! Ordered directory of announced node addresses.

use parking_lot::RwLock;
use rendez_types::NodeAddr;
use tracing::debug;

/// Ordered list of announced physical/transport address pairs.
///
/// Announcements append; no uniqueness is enforced. Removal scans from the
/// front and excises the first entry whose physical address matches.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    nodes: RwLock<Vec<NodeAddr>>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce(&self, node: NodeAddr) {
        debug!(physical = %node.physical_addr, transport = %node.transport_addr, "Announced node");
        self.nodes.write().push(node);
    }

    /// Removes the first entry announced for `physical_addr`; returns
    /// whether a match was found.
    pub fn forget(&self, physical_addr: &str) -> bool {
        let mut nodes = self.nodes.write();
        match nodes.iter().position(|n| n.physical_addr == physical_addr) {
            Some(pos) => {
                nodes.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the full directory.
    pub fn all(&self) -> Vec<NodeAddr> {
        self.nodes.read().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announce_then_forget_round_trip() {
        let directory = NodeDirectory::new();
        directory.announce(NodeAddr::new("10.0.0.1", "10.0.0.1:9000"));
        assert_eq!(directory.all().len(), 1);

        assert!(directory.forget("10.0.0.1"));
        assert!(directory.is_empty());
    }

    #[test]
    fn forget_removes_only_the_first_match() {
        let directory = NodeDirectory::new();
        directory.announce(NodeAddr::new("10.0.0.1", "10.0.0.1:9000"));
        directory.announce(NodeAddr::new("10.0.0.1", "10.0.0.1:9001"));

        assert!(directory.forget("10.0.0.1"));

        let remaining = directory.all();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].transport_addr, "10.0.0.1:9001");
    }

    #[test]
    fn forget_matches_an_entry_in_the_last_slot() {
        let directory = NodeDirectory::new();
        directory.announce(NodeAddr::new("10.0.0.1", "10.0.0.1:9000"));
        directory.announce(NodeAddr::new("10.0.0.2", "10.0.0.2:9000"));

        assert!(directory.forget("10.0.0.2"));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn forget_unknown_address_returns_false() {
        let directory = NodeDirectory::new();
        assert!(!directory.forget("192.168.0.9"));
    }
}
