use serde::{Deserialize, Serialize};

/// An announced address pair: the node's physical (IP) address and the
/// transport endpoint it serves on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddr {
    pub physical_addr: String,
    pub transport_addr: String,
}

impl NodeAddr {
    pub fn new(physical_addr: impl Into<String>, transport_addr: impl Into<String>) -> Self {
        Self {
            physical_addr: physical_addr.into(),
            transport_addr: transport_addr.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_addr_round_trips_field_names() {
        let node = NodeAddr::new("10.0.0.1", "10.0.0.1:9000");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"physical_addr\":\"10.0.0.1\""));
        assert!(json.contains("\"transport_addr\":\"10.0.0.1:9000\""));
    }
}
