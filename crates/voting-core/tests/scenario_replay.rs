//! §8 scenario 6: a chain is sealed through two rounds, serialized to JSON,
//! and replayed onto a fresh node — the thing a `SYNC`/`BLOCKCHAIN` reply
//! does for a new peer, exercised here without any networking involved.

use voting_core::{Chain, Status, Transaction};
use voting_crypto::Keypair;

fn signed(kp: &Keypair, mut tx: Transaction) -> Transaction {
    tx.sign(kp.private_key()).unwrap();
    tx
}

#[tokio::test]
async fn replaying_a_serialized_chain_preserves_finished_results() {
    let voter = Keypair::generate(512).unwrap();
    let pk = voter.public_key().clone();
    let chain = Chain::new();

    chain.admit_transaction(signed(&voter, Transaction::new_create(pk.clone(), "election1"))).await;
    chain.admit_transaction(signed(&voter, Transaction::new_start_voting(pk.clone(), "election1"))).await;
    chain
        .admit_transaction(signed(&voter, Transaction::new_add_candidate(pk.clone(), "election1", "alice")))
        .await;
    chain
        .admit_transaction(signed(&voter, Transaction::new_add_candidate(pk.clone(), "election1", "bob")))
        .await;
    let status = chain
        .admit_transaction(signed(&voter, Transaction::new_vote(pk.clone(), "election1", &pk, "alice")))
        .await;
    assert_eq!(status, Status::NewBlock);
    let block = chain.propose_block().await;
    assert!(chain.seal_block(block).await);

    let status = chain
        .admit_transaction(signed(&voter, Transaction::new_finish_voting(pk.clone(), "election1")))
        .await;
    assert_eq!(status, Status::NewTransaction);
    let finishing_block = {
        // Force a second round without four more filler transactions: the
        // coordinator normally waits for `BLOCK_CAPACITY`, but a test
        // replaying only the scenario's literal transactions seals whatever
        // is pending directly, the same way `propose_block` would once the
        // pool reached capacity.
        chain.propose_block().await
    };
    assert!(chain.seal_block(finishing_block).await);

    let snapshot = chain.snapshot().await;
    let json = serde_json::to_string(&snapshot).unwrap();
    let restored: voting_core::ChainSnapshot = serde_json::from_str(&json).unwrap();

    let fresh = Chain::new();
    assert!(fresh.merge(&restored).await);

    let results = fresh.contract_results("election1").await.unwrap().unwrap();
    assert_eq!(results.get("alice"), Some(&1));
    assert_eq!(results.get("bob"), Some(&0));
}
