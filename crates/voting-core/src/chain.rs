use std::collections::HashMap;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use voting_crypto::PublicKey;

use crate::block::{is_valid_block, Block};
use crate::contract::{Contract, ContractError};
use crate::status::Status;
use crate::transaction::{ContractMethod, Transaction};
use crate::BLOCK_CAPACITY;

/// The chain state machine: committed blocks, the pending-transaction pool,
/// and the contract registry, behind a single mutex.
///
/// The mutex covers the whole admit-or-seal critical section rather than
/// just the block-append step; the original source's advisory "is this
/// transaction already pending" check raced with concurrent admitters, and
/// folding it under the lock closes that gap (see SPEC_FULL.md §9).
pub struct Chain {
    inner: Mutex<ChainInner>,
}

struct ChainInner {
    blocks: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    contracts: HashMap<String, Contract>,
}

/// The wire representation of a chain's full state, sent in `BLOCKCHAIN` and
/// `SYNC` replies and consumed by the merge policy.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub pending_transactions: Vec<Transaction>,
    pub contracts: HashMap<String, Contract>,
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Chain {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ChainInner {
                blocks: vec![Block::genesis()],
                pending_transactions: Vec::new(),
                contracts: HashMap::new(),
            }),
        }
    }

    pub async fn tip(&self) -> Block {
        let inner = self.inner.lock().await;
        inner.blocks.last().expect("chain always has genesis").clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.blocks.len()
    }

    pub async fn is_empty(&self) -> bool {
        false // genesis is always present
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.inner.lock().await.blocks.clone()
    }

    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.inner.lock().await.pending_transactions.clone()
    }

    pub async fn contracts(&self) -> HashMap<String, Contract> {
        self.inner.lock().await.contracts.clone()
    }

    pub async fn contract(&self, name: &str) -> Option<Contract> {
        self.inner.lock().await.contracts.get(name).cloned()
    }

    pub async fn contract_results(&self, name: &str) -> Option<Result<IndexMap<String, u64>, ContractError>> {
        self.inner.lock().await.contracts.get(name).map(Contract::results)
    }

    pub async fn contract_winner(&self, name: &str) -> Option<Result<Option<String>, ContractError>> {
        self.inner.lock().await.contracts.get(name).map(Contract::winner)
    }

    pub async fn snapshot(&self) -> ChainSnapshot {
        let inner = self.inner.lock().await;
        ChainSnapshot {
            blocks: inner.blocks.clone(),
            pending_transactions: inner.pending_transactions.clone(),
            contracts: inner.contracts.clone(),
        }
    }

    /// Runs the chain admission predicate (§4.1) and, if accepted, appends
    /// `tx` to the pending pool (unless already present). Returns the
    /// resulting status; a caller seeing `Status::NewBlock` must drive a
    /// PoET round.
    pub async fn admit_transaction(&self, tx: Transaction) -> Status {
        if !tx.verify() {
            debug!(contract = %tx.contract_name, method = ?tx.contract_method, "rejecting transaction: signature does not verify");
            return Status::Ignored;
        }

        let mut inner = self.inner.lock().await;
        if !admission_precondition(&inner.contracts, &inner.pending_transactions, &tx) {
            debug!(contract = %tx.contract_name, method = ?tx.contract_method, "rejecting transaction: precondition failed");
            return Status::Ignored;
        }

        if !inner.pending_transactions.contains(&tx) {
            inner.pending_transactions.push(tx);
        }

        if inner.pending_transactions.len() >= BLOCK_CAPACITY {
            Status::NewBlock
        } else {
            Status::NewTransaction
        }
    }

    /// Builds a candidate block from the current pending pool, linked to the
    /// current tip. Does not append it — that happens through `seal_block`
    /// once a validator's timer elects it.
    pub async fn propose_block(&self) -> Block {
        let inner = self.inner.lock().await;
        let tip = inner.blocks.last().expect("chain always has genesis");
        Block::new(inner.pending_transactions.clone(), tip.hash.clone())
    }

    /// Validates `block` against the current tip and, on success, appends
    /// it, replays its transactions against the contract registry, and
    /// prunes now-committed transactions from the pending pool. Returns
    /// whether the append happened — `false` means a peer or a competing
    /// validator already moved the tip (§4.5's tie policy).
    pub async fn seal_block(&self, block: Block) -> bool {
        let mut inner = self.inner.lock().await;
        let tip = inner.blocks.last().expect("chain always has genesis").clone();
        if !is_valid_block(&block, &tip) {
            debug!(hash = %block.hash, "rejecting block: fails validation against current tip");
            return false;
        }
        inner.blocks.push(block.clone());
        execute_block(&mut inner.contracts, &block);
        inner.pending_transactions.retain(|tx| !block.transactions.contains(tx));
        true
    }

    /// `true` iff the chain already contains a block with this hash — used
    /// by validators to detect that their candidate was already sealed by
    /// someone else before attempting their own append.
    pub async fn has_block_hash(&self, hash: &str) -> bool {
        self.inner.lock().await.blocks.iter().any(|b| b.hash == hash)
    }

    /// The longest-chain / richer-contract-set merge policy (§4.6). Returns
    /// whether anything in local state changed, in which case the caller
    /// should re-broadcast.
    pub async fn merge(&self, peer: &ChainSnapshot) -> bool {
        let mut inner = self.inner.lock().await;
        let mut changed = false;

        if peer.contracts.len() > inner.contracts.len() {
            inner.contracts = peer.contracts.clone();
            changed = true;
        }

        if peer.blocks.len() > inner.blocks.len() {
            inner.blocks = peer.blocks.clone();
            if let Some(tip) = peer.blocks.last() {
                inner
                    .pending_transactions
                    .retain(|tx| !tip.transactions.contains(tx));
            }
            inner.contracts = peer.contracts.clone();
            changed = true;
        } else if peer.blocks.len() == inner.blocks.len() {
            for tx in &peer.pending_transactions {
                if inner.pending_transactions.contains(tx) {
                    continue;
                }
                if !tx.verify() {
                    continue;
                }
                if admission_precondition(&inner.contracts, &inner.pending_transactions, tx) {
                    inner.pending_transactions.push(tx.clone());
                    changed = true;
                }
            }
        }

        changed
    }
}

fn contract_exists(contracts: &HashMap<String, Contract>, pending: &[Transaction], name: &str) -> bool {
    contracts.contains_key(name)
        || pending
            .iter()
            .any(|tx| tx.contract_method == ContractMethod::Create && tx.contract_name == name)
}

fn voting_started(contracts: &HashMap<String, Contract>, pending: &[Transaction], name: &str) -> bool {
    contracts
        .get(name)
        .map(|c| !matches!(c.state, crate::contract::ContractState::NotStarted))
        .unwrap_or(false)
        || pending
            .iter()
            .any(|tx| tx.contract_method == ContractMethod::StartVoting && tx.contract_name == name)
}

fn candidate_exists(
    contracts: &HashMap<String, Contract>,
    pending: &[Transaction],
    name: &str,
    candidate: &str,
) -> bool {
    contracts.get(name).map(|c| c.has_candidate(candidate)).unwrap_or(false)
        || pending.iter().any(|tx| {
            tx.contract_method == ContractMethod::AddCandidate
                && tx.contract_name == name
                && tx.add_candidate_name() == Some(candidate)
        })
}

fn already_finished(contracts: &HashMap<String, Contract>, pending: &[Transaction], name: &str) -> bool {
    contracts.get(name).map(Contract::is_finished).unwrap_or(false)
        || pending
            .iter()
            .any(|tx| tx.contract_method == ContractMethod::FinishVoting && tx.contract_name == name)
}

fn voter_already_voted(
    contracts: &HashMap<String, Contract>,
    pending: &[Transaction],
    name: &str,
    voter: &PublicKey,
) -> bool {
    contracts.get(name).map(|c| c.has_voted(voter)).unwrap_or(false)
        || pending.iter().any(|tx| {
            tx.contract_method == ContractMethod::Vote
                && tx.contract_name == name
                && tx.vote_subject().as_ref() == Some(voter)
        })
}

/// The method-specific admission precondition (§4.1), evaluated against the
/// union of committed state and the still-pending pool.
fn admission_precondition(contracts: &HashMap<String, Contract>, pending: &[Transaction], tx: &Transaction) -> bool {
    match tx.contract_method {
        ContractMethod::Create => !contract_exists(contracts, pending, &tx.contract_name),

        ContractMethod::StartVoting => {
            contract_exists(contracts, pending, &tx.contract_name)
                && !voting_started(contracts, pending, &tx.contract_name)
        }

        ContractMethod::AddCandidate => {
            let Some(candidate) = tx.add_candidate_name() else {
                return false;
            };
            contract_exists(contracts, pending, &tx.contract_name)
                && !voting_started(contracts, pending, &tx.contract_name)
                && !candidate_exists(contracts, pending, &tx.contract_name, candidate)
        }

        ContractMethod::Vote => {
            let (Some(subject), Some(candidate)) = (tx.vote_subject(), tx.vote_candidate()) else {
                return false;
            };
            contract_exists(contracts, pending, &tx.contract_name)
                && contracts.get(&tx.contract_name).map(Contract::is_in_progress).unwrap_or(false)
                && candidate_exists(contracts, pending, &tx.contract_name, candidate)
                && !voter_already_voted(contracts, pending, &tx.contract_name, &subject)
        }

        ContractMethod::FinishVoting => {
            contract_exists(contracts, pending, &tx.contract_name)
                && contracts.get(&tx.contract_name).map(Contract::is_in_progress).unwrap_or(false)
                && !already_finished(contracts, pending, &tx.contract_name)
        }
    }
}

/// Deterministic execution of a single transaction (§4.2). Errors are
/// expected for malformed peer blocks whose transactions slipped past a
/// different node's admission predicate (e.g. a fork); they are logged and
/// contained to this transaction, never propagated.
fn execute_transaction(contracts: &mut HashMap<String, Contract>, tx: &Transaction) {
    match tx.contract_method {
        ContractMethod::Create => {
            contracts
                .entry(tx.contract_name.clone())
                .or_insert_with(|| Contract::new(tx.contract_name.clone()));
        }
        ContractMethod::StartVoting => match contracts.get_mut(&tx.contract_name) {
            Some(c) => {
                if let Err(e) = c.start_voting() {
                    warn!(contract = %tx.contract_name, error = %e, "start_voting replay failed");
                }
            }
            None => warn!(contract = %tx.contract_name, "start_voting replay: unknown contract"),
        },
        ContractMethod::FinishVoting => match contracts.get_mut(&tx.contract_name) {
            Some(c) => {
                if let Err(e) = c.finish_voting() {
                    warn!(contract = %tx.contract_name, error = %e, "finish_voting replay failed");
                }
            }
            None => warn!(contract = %tx.contract_name, "finish_voting replay: unknown contract"),
        },
        ContractMethod::AddCandidate => {
            let Some(name) = tx.add_candidate_name() else {
                warn!(contract = %tx.contract_name, "add_candidate replay: missing candidate name");
                return;
            };
            match contracts.get_mut(&tx.contract_name) {
                Some(c) => {
                    if let Err(e) = c.add_candidate(name) {
                        warn!(contract = %tx.contract_name, error = %e, "add_candidate replay failed");
                    }
                }
                None => warn!(contract = %tx.contract_name, "add_candidate replay: unknown contract"),
            }
        }
        ContractMethod::Vote => {
            let (Some(subject), Some(candidate)) = (tx.vote_subject(), tx.vote_candidate()) else {
                warn!(contract = %tx.contract_name, "vote replay: missing subject or candidate");
                return;
            };
            match contracts.get_mut(&tx.contract_name) {
                Some(c) => {
                    if let Err(e) = c.vote(&subject, candidate) {
                        warn!(contract = %tx.contract_name, error = %e, "vote replay failed");
                    }
                }
                None => warn!(contract = %tx.contract_name, "vote replay: unknown contract"),
            }
        }
    }
}

fn execute_block(contracts: &mut HashMap<String, Contract>, block: &Block) {
    for tx in &block.transactions {
        execute_transaction(contracts, tx);
    }
}
