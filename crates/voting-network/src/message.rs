use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use voting_consensus::{Peer, ValidatorDescriptor};
use voting_core::{Block, Contract, Transaction};

/// The full wire message taxonomy (§4.7, §6). Internally tagged on `type`
/// with the exact spelling the dispatch table uses, so a captured frame on
/// the wire reads as `{"type": "NEW_BLOCK", "block": {...}}` — no separate
/// envelope struct needed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    NewTransaction { transaction: Transaction },
    NewBlock { block: Block },
    NewPeer { peer: Peer },
    NewValidator { validator: ValidatorDescriptor },
    GetBlockchain { address: Peer },
    Blockchain { blockchain: voting_core::ChainSnapshot },
    GetPendingTransactions { address: Peer },
    PendingTransactions { transactions: Vec<Transaction> },
    Contracts { contracts: HashMap<String, Contract> },
    ValidateNewBlock { block: Block },
    GenerateWaitTime { address: Peer },
    WaitTime { wait_time: f64, address: Peer },
    AddElapsedTime { time: f64 },
    Sync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_roundtrips_with_the_documented_tag() {
        let json = serde_json::to_string(&Message::Sync).unwrap();
        assert_eq!(json, r#"{"type":"SYNC"}"#);
        let restored: Message = serde_json::from_str(&json).unwrap();
        assert!(matches!(restored, Message::Sync));
    }

    #[test]
    fn add_elapsed_time_roundtrips() {
        let msg = Message::AddElapsedTime { time: 2.5 };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"ADD_ELAPSED_TIME","time":2.5}"#);
        let restored: Message = serde_json::from_str(&json).unwrap();
        match restored {
            Message::AddElapsedTime { time } => assert_eq!(time, 2.5),
            _ => panic!("wrong variant"),
        }
    }
}
