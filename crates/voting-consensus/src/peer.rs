use serde::{Deserialize, Serialize};

/// A network address, identifying either a peer in the gossip overlay or a
/// validator's callback address for PoET round messages. Lives in this
/// crate (rather than `voting-network`, where the gossip-overlay concept of
/// a "peer" otherwise belongs) because `Validator` needs it and
/// `voting-network` sits above `voting-consensus` in the dependency graph;
/// `voting_network::Peer` is a re-export of this type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}
impl Eq for Peer {}

impl std::hash::Hash for Peer {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.port.hash(state);
        self.host.hash(state);
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
