use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use voting_consensus::{ConsensusError, Peer, Roster, Validator, ValidatorDescriptor};
use voting_core::{Block, Chain, ChainSnapshot, Contract, Status, Transaction};

use crate::errors::NetworkError;
use crate::framing::write_message;
use crate::message::Message;

/// Outbound sends get a fresh connection and a 30s timeout (§4.7, §6).
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// The P2P node (§4.6): owns the chain, the peer set, the validator roster
/// and (through the roster) a handle to the local validator. The server
/// (`crate::server`) holds a shared `Arc<Node>` and dispatches inbound
/// messages onto these methods — there is no back-reference from `Node` to
/// the server, per SPEC_FULL's "no back-pointers" design note.
pub struct Node {
    pub self_address: Peer,
    pub chain: Arc<Chain>,
    pub roster: Arc<Roster>,
    peers: Mutex<Vec<Peer>>,
}

impl Node {
    pub fn new(self_address: Peer, chain: Arc<Chain>) -> Self {
        Self {
            self_address,
            chain,
            roster: Arc::new(Roster::new()),
            peers: Mutex::new(Vec::new()),
        }
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.peers.lock().await.clone()
    }

    /// Adds `peer` if not already present. Returns whether it was new.
    pub async fn add_peer(&self, peer: Peer) -> bool {
        let mut peers = self.peers.lock().await;
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    pub async fn register_validator(&self, validator: Arc<Validator>) -> Result<(), ConsensusError> {
        self.roster.register_local(validator).await
    }

    pub async fn add_validator(&self, validator: Arc<Validator>) -> bool {
        self.roster.add_remote(validator).await
    }

    pub async fn validators(&self) -> Vec<ValidatorDescriptor> {
        self.roster.all().await.iter().map(|v| v.as_ref().into()).collect()
    }

    /// Admits `tx` through the chain's admission predicate (§4.1); if the
    /// pool just reached capacity, spawns a PoET round (§4.5) rather than
    /// blocking the caller on it.
    pub async fn add_transaction(self: &Arc<Self>, tx: Transaction) -> Status {
        let status = self.chain.admit_transaction(tx).await;
        if status == Status::NewBlock {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.run_poet_round().await });
        }
        status
    }

    /// Validates and appends a gossiped block (§4.6 `add_block`). On
    /// success, stops this node's own in-flight round timers — the round
    /// this block concludes is over regardless of who sealed it.
    pub async fn add_block(&self, block: Block) -> bool {
        let sealed = self.chain.seal_block(block).await;
        if sealed {
            self.roster.stop_all_timers().await;
        }
        sealed
    }

    pub async fn sync_blockchain(&self, snapshot: ChainSnapshot) -> bool {
        self.chain.merge(&snapshot).await
    }

    /// A standalone `CONTRACTS` message only ever feeds the richer-contract-set
    /// branch of the merge policy — it can never mutate contract state
    /// directly (SPEC_FULL §9's resolved open question).
    pub async fn receive_contracts(&self, contracts: HashMap<String, Contract>) -> bool {
        let snapshot = ChainSnapshot {
            blocks: self.chain.blocks().await,
            pending_transactions: self.chain.pending_transactions().await,
            contracts,
        };
        self.chain.merge(&snapshot).await
    }

    /// Drives one PoET round (§4.5) end to end: draw, equalize, propose,
    /// elect, commit.
    pub async fn run_poet_round(self: Arc<Self>) {
        let Some(local) = self.roster.local().await else {
            warn!("no local validator registered, cannot drive a PoET round");
            return;
        };

        // 1. Draw phase.
        local.generate_wait_time().await;
        for remote in self.roster.remotes().await {
            self.request_wait_time(&remote).await;
        }
        self.roster.wait_for_all_wait_times().await;

        // 2. Equalization phase: everyone's timer drops by the round minimum,
        // so the validator that drew it has zero remaining.
        if let Some(min) = self.roster.min_wait_time().await {
            self.roster.add_elapsed_time_to_all(-min).await;
            self.broadcast_elapsed_time(-min).await;
        }

        // 3. Proposal phase.
        let candidate = self.chain.propose_block().await;
        for remote in self.roster.remotes().await {
            self.send_validate_new_block(&remote, &candidate).await;
        }

        // 4. Election phase (local validator only — remote validators run
        // their own copy of this phase on their own node).
        let endorsed = local.validate_block(candidate.clone());
        let Ok(block) = endorsed.await else {
            debug!("local validator's candidate timer was cancelled before firing");
            return;
        };

        if self.chain.has_block_hash(&block.hash).await {
            info!(hash = %block.hash, "block already sealed by a peer, stepping aside");
            self.roster.stop_all_timers().await;
            return;
        }

        // 5. Commit side-effects.
        if self.chain.seal_block(block.clone()).await {
            self.roster.stop_all_timers().await;
            self.broadcast_new_block(&block).await;
        }
    }

    async fn request_wait_time(&self, remote: &Arc<Validator>) {
        let message = Message::GenerateWaitTime {
            address: self.self_address.clone(),
        };
        self.send_to(&remote.address, message).await;
    }

    /// Inbound `WAIT_TIME` reply handler: records the remote's draw and
    /// wakes the roster's draw-phase waiter.
    pub async fn receive_wait_time(&self, address: Peer, wait_time: f64) -> bool {
        self.roster.record_wait_time(&address, wait_time).await
    }

    async fn broadcast_elapsed_time(&self, delta: f64) {
        for remote in self.roster.remotes().await {
            self.send_to(&remote.address, Message::AddElapsedTime { time: delta }).await;
        }
    }

    async fn send_validate_new_block(&self, remote: &Arc<Validator>, block: &Block) {
        self.send_to(&remote.address, Message::ValidateNewBlock { block: block.clone() }).await;
    }

    pub async fn broadcast_new_block(&self, block: &Block) {
        self.broadcast(Message::NewBlock { block: block.clone() }).await;
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) {
        self.broadcast(Message::NewTransaction { transaction: tx.clone() }).await;
    }

    pub async fn broadcast(&self, message: Message) {
        for peer in self.peers().await {
            self.send_to(&peer, message.clone()).await;
        }
    }

    /// Bootstraps against `peer`: adds it, announces this node, then issues
    /// `GET_BLOCKCHAIN` for catch-up (§4.7 `connect_to_peer`) — the reply
    /// arrives later on a fresh connection and is handled by the server's
    /// own `Blockchain` branch, same as any other gossiped chain.
    pub async fn connect_to_peer(self: &Arc<Self>, peer: Peer) {
        if self.add_peer(peer.clone()).await {
            self.send_to(&peer, Message::NewPeer { peer: self.self_address.clone() }).await;
        }
        self.send_to(&peer, Message::GetBlockchain { address: self.self_address.clone() }).await;
    }

    /// Requests a full chain and pending-pool catch-up from every known peer
    /// (the `sync()` request-API operation, §6). Unlike `connect_to_peer`'s
    /// `GET_BLOCKCHAIN`, this uses `SYNC`: one connection per peer, both
    /// halves of the reply read back on it directly rather than arriving
    /// later through the server's dispatch loop.
    pub async fn sync(self: &Arc<Self>) {
        for peer in self.peers().await {
            let result = tokio::time::timeout(SEND_TIMEOUT, self.sync_with(&peer)).await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%peer, error = %e, "failed to sync with peer"),
                Err(_) => warn!(%peer, "timed out syncing with peer"),
            }
        }
    }

    async fn sync_with(self: &Arc<Self>, peer: &Peer) -> Result<(), NetworkError> {
        let mut stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
        write_message(&mut stream, &Message::Sync).await?;

        let blockchain = match crate::framing::read_message(&mut stream).await? {
            Some(Message::Blockchain { blockchain }) => blockchain,
            Some(_) | None => {
                return Err(NetworkError::MalformedMessage(
                    "expected a BLOCKCHAIN reply to SYNC".into(),
                ))
            }
        };
        self.sync_blockchain(blockchain).await;

        let transactions = match crate::framing::read_message(&mut stream).await? {
            Some(Message::PendingTransactions { transactions }) => transactions,
            Some(_) | None => {
                return Err(NetworkError::MalformedMessage(
                    "expected a PENDING_TRANSACTIONS reply to SYNC".into(),
                ))
            }
        };
        for tx in transactions {
            self.add_transaction(tx).await;
        }
        Ok(())
    }

    /// Opens a fresh outbound connection to `peer`, frames `message`, and
    /// sends it under a 30s timeout. Failures are logged and dropped (§4.7,
    /// §7) — nothing here is fatal to the node.
    pub async fn send_to(&self, peer: &Peer, message: Message) {
        let result = tokio::time::timeout(SEND_TIMEOUT, self.send_to_inner(peer, message)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(%peer, error = %e, "failed to send message to peer"),
            Err(_) => warn!(%peer, "timed out sending message to peer"),
        }
    }

    async fn send_to_inner(&self, peer: &Peer, message: Message) -> Result<(), NetworkError> {
        let mut stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
        write_message(&mut stream, &message).await
    }
}
