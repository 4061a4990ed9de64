use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;

/// An ordered batch of transactions linked to its predecessor by hash.
///
/// `hash` is always the recomputation of the canonical JSON encoding of
/// `{timestamp, transactions, previous_hash}` with every object's keys
/// sorted lexicographically (by constructing through `serde_json::Value`,
/// whose `Map` is a `BTreeMap` as long as `serde_json`'s `preserve_order`
/// feature stays off, which it does throughout this workspace).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
}

#[derive(Serialize)]
struct HashData<'a> {
    timestamp: u64,
    transactions: &'a [Transaction],
    previous_hash: &'a str,
}

/// SHA-256 over the canonical, recursively key-sorted JSON encoding.
pub fn compute_hash(timestamp: u64, transactions: &[Transaction], previous_hash: &str) -> String {
    let data = HashData {
        timestamp,
        transactions,
        previous_hash,
    };
    let value = serde_json::to_value(&data).expect("hash data is always representable as JSON");
    let bytes = serde_json::to_vec(&value).expect("JSON values always serialize");
    voting_crypto::sha256_hex(&bytes)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

impl Block {
    /// The block with empty transactions, `previous_hash = "0"`, `timestamp = 0`,
    /// at the root of every chain.
    pub fn genesis() -> Self {
        Self::with_timestamp(vec![], "0".to_string(), 0)
    }

    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(transactions, previous_hash, now_secs())
    }

    pub fn with_timestamp(transactions: Vec<Transaction>, previous_hash: String, timestamp: u64) -> Self {
        let hash = compute_hash(timestamp, &transactions, &previous_hash);
        Self {
            timestamp,
            transactions,
            previous_hash,
            hash,
        }
    }

    /// Recomputes this block's hash from its current fields; used by
    /// `is_valid_block` to detect tampering.
    pub fn recompute_hash(&self) -> String {
        compute_hash(self.timestamp, &self.transactions, &self.previous_hash)
    }
}

/// Block validation (§4.3): `block` must link to `prev` by hash, its stored
/// hash must match its contents, and every transaction it carries must
/// verify under its claimed signer.
pub fn is_valid_block(block: &Block, prev: &Block) -> bool {
    block.previous_hash == prev.hash
        && block.hash == block.recompute_hash()
        && block.transactions.iter().all(Transaction::verify)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use voting_crypto::Keypair;

    #[test]
    fn genesis_block_has_sentinel_previous_hash() {
        let genesis = Block::genesis();
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.timestamp, 0);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.hash, genesis.recompute_hash());
    }

    #[test]
    fn hash_changes_if_transactions_change() {
        let kp = Keypair::generate(512).unwrap();
        let tx = Transaction::new_create(kp.public_key().clone(), "election1");
        let empty = Block::with_timestamp(vec![], "0".to_string(), 1);
        let with_tx = Block::with_timestamp(vec![tx], "0".to_string(), 1);
        assert_ne!(empty.hash, with_tx.hash);
    }

    #[test]
    fn tampering_with_hash_is_detectable() {
        let mut b = Block::genesis();
        b.hash = "not-the-real-hash".to_string();
        assert_ne!(b.hash, b.recompute_hash());
    }

    #[test]
    fn json_roundtrip_preserves_equality() {
        let b = Block::genesis();
        let json = serde_json::to_string(&b).unwrap();
        let restored: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(b, restored);
    }

    #[test]
    fn valid_successor_links_to_its_predecessor() {
        let genesis = Block::genesis();
        let next = Block::with_timestamp(vec![], genesis.hash.clone(), 1);
        assert!(is_valid_block(&next, &genesis));
    }

    #[test]
    fn block_with_wrong_previous_hash_is_invalid() {
        let genesis = Block::genesis();
        let next = Block::with_timestamp(vec![], "wrong".to_string(), 1);
        assert!(!is_valid_block(&next, &genesis));
    }

    #[test]
    fn block_with_unsigned_transaction_is_invalid() {
        let kp = Keypair::generate(512).unwrap();
        let tx = Transaction::new_create(kp.public_key().clone(), "election1");
        let genesis = Block::genesis();
        let next = Block::with_timestamp(vec![tx], genesis.hash.clone(), 1);
        assert!(!is_valid_block(&next, &genesis));
    }
}
