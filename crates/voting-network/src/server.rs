use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use voting_consensus::Validator;

use crate::errors::NetworkError;
use crate::framing::{read_message, write_message};
use crate::message::Message;
use crate::node::Node;

/// The framed-TCP listener (§4.7): binds once, then serves every accepted
/// connection on its own task. Each connection carries exactly one
/// request/reply-style message, matching the original's
/// `with conn: receive_message(...)` shape — a peer that wants to send
/// another message opens another connection.
pub struct Server {
    listener: TcpListener,
    node: Arc<Node>,
}

impl Server {
    pub async fn bind(node: Arc<Node>) -> Result<Self, NetworkError> {
        let addr = (node.self_address.host.as_str(), node.self_address.port);
        let listener = TcpListener::bind(addr).await?;
        info!(address = %node.self_address, "listening");
        Ok(Self { listener, node })
    }

    pub fn local_node(&self) -> Arc<Node> {
        Arc::clone(&self.node)
    }

    /// Accepts connections forever, dispatching each to its own task. Never
    /// returns under normal operation; an accept error is logged and the
    /// loop continues (a single bad connection attempt is not fatal to the
    /// node, per §7).
    pub async fn run(&self) -> ! {
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    debug!(%addr, "accepted connection");
                    let node = Arc::clone(&self.node);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, node).await {
                            warn!(%addr, error = %e, "error handling connection");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream, node: Arc<Node>) -> Result<(), NetworkError> {
    let Some(message) = read_message(&mut socket).await? else {
        return Ok(());
    };
    dispatch(&mut socket, node, message).await
}

/// The dispatch table (§4.7). Every branch logs and returns on rejection
/// rather than propagating an error — an invalid or malformed inbound
/// message is never fatal to the node (§7).
async fn dispatch(socket: &mut TcpStream, node: Arc<Node>, message: Message) -> Result<(), NetworkError> {
    match message {
        Message::NewTransaction { transaction } => {
            let status = node.add_transaction(transaction.clone()).await;
            if status != voting_core::Status::Ignored {
                node.broadcast_transaction(&transaction).await;
            }
        }

        Message::NewBlock { block } => {
            if node.add_block(block.clone()).await {
                node.broadcast_new_block(&block).await;
            }
        }

        Message::NewPeer { peer } => {
            node.add_peer(peer).await;
        }

        Message::NewValidator { validator } => {
            let added = node.add_validator(Arc::new(Validator::from(validator.clone()))).await;
            if added {
                node.broadcast(Message::NewValidator { validator }).await;
            }
        }

        Message::GetBlockchain { address } => {
            let snapshot = node.chain.snapshot().await;
            node.send_to(&address, Message::Blockchain { blockchain: snapshot }).await;
        }

        Message::Blockchain { blockchain } => {
            if node.sync_blockchain(blockchain.clone()).await {
                node.broadcast(Message::Blockchain { blockchain }).await;
            }
        }

        Message::GetPendingTransactions { address } => {
            let transactions = node.chain.pending_transactions().await;
            node.send_to(&address, Message::PendingTransactions { transactions }).await;
        }

        Message::PendingTransactions { transactions } => {
            for tx in transactions {
                node.add_transaction(tx).await;
            }
        }

        Message::Contracts { contracts } => {
            node.receive_contracts(contracts).await;
        }

        Message::ValidateNewBlock { block } => {
            if let Some(local) = node.roster.local().await {
                let rx = local.validate_block(block.clone());
                let node = Arc::clone(&node);
                tokio::spawn(async move {
                    let Ok(endorsed) = rx.await else { return };
                    if node.chain.has_block_hash(&endorsed.hash).await {
                        node.roster.stop_all_timers().await;
                        return;
                    }
                    if node.chain.seal_block(endorsed.clone()).await {
                        node.roster.stop_all_timers().await;
                        node.broadcast_new_block(&endorsed).await;
                    }
                });
            } else {
                warn!("received VALIDATE_NEW_BLOCK with no local validator registered");
            }
        }

        Message::GenerateWaitTime { address } => {
            if let Some(local) = node.roster.local().await {
                let wait_time = local.generate_wait_time().await;
                node.send_to(
                    &address,
                    Message::WaitTime {
                        wait_time,
                        address: node.self_address.clone(),
                    },
                )
                .await;
            }
        }

        Message::WaitTime { wait_time, address } => {
            node.receive_wait_time(address, wait_time).await;
        }

        Message::AddElapsedTime { time } => {
            node.roster.add_elapsed_time_to_all(time).await;
        }

        Message::Sync => {
            // No `address` field to reply via a fresh connection to, unlike
            // every other request type — reply on the connection it arrived
            // on instead, with both halves of the catch-up payload (§4.7's
            // "send chain and pending pool to requester").
            let blockchain = node.chain.snapshot().await;
            let pending_transactions = node.chain.pending_transactions().await;
            write_message(socket, &Message::Blockchain { blockchain }).await?;
            write_message(socket, &Message::PendingTransactions { transactions: pending_transactions }).await?;
        }
    }
    Ok(())
}
