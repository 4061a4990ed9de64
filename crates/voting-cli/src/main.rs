use std::sync::Arc;

use clap::Parser;
use tracing::info;

use voting_consensus::{Peer, Validator};
use voting_core::Chain;
use voting_network::{Node, Server};
use voting_rpc::{RpcHandler, RpcServer};

/// Starts one voting-chain node: binds the P2P listener, joins any
/// bootstrap peers, and serves the request API over HTTP (§6).
#[derive(Parser, Debug)]
#[command(name = "voting-node", about = "Permissioned PoET voting-chain node")]
struct Cli {
    /// Host this node's P2P listener binds and advertises to peers on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port this node's P2P listener binds to.
    #[arg(long)]
    port: u16,

    /// Port the request API (§6) listens on.
    #[arg(long)]
    rpc_port: u16,

    /// Existing peers to bootstrap against, as `host:port`. A node started
    /// with none of these is the network's first member.
    #[arg(long = "bootstrap-peer", value_parser = parse_peer)]
    bootstrap_peers: Vec<Peer>,

    /// PKCS#1 PEM file holding this node's identity. Generated and saved
    /// here if it doesn't exist yet.
    #[arg(long)]
    keypair: Option<std::path::PathBuf>,

    /// Register as a PoET validator for this node's own identity on startup.
    #[arg(long)]
    validator: bool,
}

fn parse_peer(s: &str) -> Result<Peer, String> {
    let (host, port) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got {s:?}"))?;
    let port: u16 = port.parse().map_err(|e| format!("invalid port in {s:?}: {e}"))?;
    Ok(Peer::new(host, port))
}

fn load_or_generate_keypair(path: Option<&std::path::Path>) -> anyhow::Result<voting_crypto::Keypair> {
    let Some(path) = path else {
        return Ok(voting_crypto::Keypair::generate_default()?);
    };
    if path.exists() {
        Ok(voting_wallet::keypair::load_from_file(path)?)
    } else {
        let keypair = voting_crypto::Keypair::generate_default()?;
        voting_wallet::keypair::save_to_file(&keypair, path)?;
        Ok(keypair)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let keypair = Arc::new(load_or_generate_keypair(cli.keypair.as_deref())?);
    info!(identity = %keypair.public_key().to_hex(), "node identity loaded");

    let self_address = Peer::new(cli.host.clone(), cli.port);
    let chain = Arc::new(Chain::new());
    let node = Arc::new(Node::new(self_address.clone(), chain));

    if cli.validator {
        let validator = Arc::new(Validator::new(keypair.public_key().clone(), self_address.clone()));
        node.register_validator(validator).await?;
        info!("registered as a validator for this node's own identity");
    }

    for peer in cli.bootstrap_peers {
        info!(%peer, "connecting to bootstrap peer");
        node.connect_to_peer(peer).await;
    }

    let server = Server::bind(Arc::clone(&node)).await?;
    tokio::spawn(async move { server.run().await });

    let handler = Arc::new(RpcHandler::new(Arc::clone(&node), keypair));
    RpcServer::new(handler, cli.rpc_port).run().await;

    Ok(())
}
