use std::sync::Arc;

use indexmap::IndexMap;

use voting_consensus::{Peer, Validator, ValidatorDescriptor};
use voting_core::{ChainSnapshot, Status, Transaction};
use voting_crypto::{Keypair, PublicKey};
use voting_network::Node;

use crate::errors::RpcError;

/// A thin façade over `voting-network::Node` (§6's request API surface):
/// every method here either signs and submits a transaction on behalf of
/// this node's own identity, or forwards directly to a `Node`/`Chain`
/// query. No consensus or admission logic lives here — rejections come
/// straight back from the core as `Status::Ignored` or an `Err`, never
/// reinterpreted.
#[derive(Clone)]
pub struct RpcHandler {
    node: Arc<Node>,
    identity: Arc<Keypair>,
}

impl RpcHandler {
    pub fn new(node: Arc<Node>, identity: Arc<Keypair>) -> Self {
        Self { node, identity }
    }

    fn sign(&self, mut tx: Transaction) -> Result<Transaction, RpcError> {
        tx.sign(self.identity.private_key())?;
        Ok(tx)
    }

    /// Admits a freshly signed transaction and, if it wasn't rejected,
    /// gossips it to peers the same way an inbound `NEW_TRANSACTION` would
    /// be relayed (§4.7) — a locally originated transaction is otherwise
    /// indistinguishable from one that arrived over the wire.
    async fn submit(&self, tx: Transaction) -> Result<Status, RpcError> {
        let tx = self.sign(tx)?;
        let status = self.node.add_transaction(tx.clone()).await;
        if status != Status::Ignored {
            self.node.broadcast_transaction(&tx).await;
        }
        Ok(status)
    }

    pub async fn create_contract(&self, contract_name: String) -> Result<Status, RpcError> {
        let tx = Transaction::new_create(self.identity.public_key().clone(), contract_name);
        self.submit(tx).await
    }

    pub async fn add_candidate(
        &self,
        contract_name: String,
        candidate: String,
    ) -> Result<Status, RpcError> {
        let tx = Transaction::new_add_candidate(self.identity.public_key().clone(), contract_name, candidate);
        self.submit(tx).await
    }

    pub async fn start_voting(&self, contract_name: String) -> Result<Status, RpcError> {
        let tx = Transaction::new_start_voting(self.identity.public_key().clone(), contract_name);
        self.submit(tx).await
    }

    pub async fn vote(
        &self,
        contract_name: String,
        subject_hex: String,
        candidate: String,
    ) -> Result<Status, RpcError> {
        let subject = PublicKey::from_hex(&subject_hex)
            .map_err(|_| RpcError::InvalidPublicKey(subject_hex))?;
        let tx = Transaction::new_vote(
            self.identity.public_key().clone(),
            contract_name,
            &subject,
            candidate,
        );
        self.submit(tx).await
    }

    pub async fn finish_voting(&self, contract_name: String) -> Result<Status, RpcError> {
        let tx = Transaction::new_finish_voting(self.identity.public_key().clone(), contract_name);
        self.submit(tx).await
    }

    /// Registers this node's own identity as a validator (§6
    /// `register_validator(local_identity)`).
    pub async fn register_validator(&self) -> Result<(), RpcError> {
        let validator = Arc::new(Validator::new(
            self.identity.public_key().clone(),
            self.node.self_address.clone(),
        ));
        self.node.register_validator(validator).await?;
        Ok(())
    }

    pub async fn connect_to_peer(&self, host: String, port: u16) {
        self.node.connect_to_peer(Peer::new(host, port)).await;
    }

    pub async fn sync(&self) {
        self.node.sync().await;
    }

    pub async fn get_chain(&self) -> ChainSnapshot {
        self.node.chain.snapshot().await
    }

    pub async fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.node.chain.pending_transactions().await
    }

    pub async fn get_peers(&self) -> Vec<Peer> {
        self.node.peers().await
    }

    pub async fn get_validators(&self) -> Vec<ValidatorDescriptor> {
        self.node.validators().await
    }

    pub async fn get_contract_results(&self, name: &str) -> Result<IndexMap<String, u64>, RpcError> {
        self.node
            .chain
            .contract_results(name)
            .await
            .ok_or_else(|| RpcError::UnknownContract(name.to_string()))?
            .map_err(RpcError::from)
    }
}
