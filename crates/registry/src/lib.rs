//! The rendez core: the authoritative peer adjacency graph, the port
//! allocation counter, and the announced-node directory.
//!
//! Everything here is plain in-memory state behind its own synchronization
//! discipline — a single coarse reader/writer lock for the graph, an atomic
//! counter for ports, and an independent lock for the node list. Nothing is
//! persisted; the registry is the single source of truth for as long as the
//! process lives.

pub mod directory;
pub mod ports;
pub mod topology;

pub use directory::NodeDirectory;
pub use ports::{PortAllocator, PORT_BASE};
pub use topology::Topology;

/// Owned state of the whole registry service: the peer graph, the port
/// counter, and the node address directory.
///
/// Constructed once at process start and shared by handle with every
/// request handler; there are no package-level globals.
#[derive(Debug, Default)]
pub struct Registry {
    pub topology: Topology,
    pub ports: PortAllocator,
    pub directory: NodeDirectory,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
}
