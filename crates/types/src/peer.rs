use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque network address identifying a peer. Equality is by value; the
/// registry never interprets the string beyond comparing it.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerAddr(String);

impl PeerAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddr {
    fn from(addr: &str) -> Self {
        Self(addr.to_string())
    }
}

impl From<String> for PeerAddr {
    fn from(addr: String) -> Self {
        Self(addr)
    }
}

impl Borrow<str> for PeerAddr {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A peer's record in the topology: identity, allocated listening port,
/// the neighbors it claims adjacency to, and liveness flags.
///
/// The neighbor list is an edge list, not a set: repeated enrollment with
/// the same neighbor appends duplicate entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerProfile {
    pub addr: PeerAddr,
    /// Port assigned to this peer; zero until one has been allocated.
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub neighbors: Vec<PeerAddr>,
    /// Alive/dead flag as reported by the peer. The registry does not
    /// verify it.
    #[serde(default)]
    pub alive: bool,
    /// Reserved for connection tracking; never gates an operation.
    #[serde(default)]
    pub connected: bool,
}

impl PeerProfile {
    /// Empty record for an address first seen as somebody else's neighbor.
    pub fn placeholder(addr: PeerAddr) -> Self {
        Self {
            addr,
            ..Self::default()
        }
    }
}
