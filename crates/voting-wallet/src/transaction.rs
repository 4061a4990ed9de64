use voting_core::Transaction;
use voting_crypto::{Keypair, PublicKey};

use crate::errors::WalletError;

/// Builds and signs a `voting_core::Transaction` with a loaded wallet
/// keypair, the one step every demo script in the original source (and
/// `voting-rpc`'s submit path) otherwise repeats inline.
pub fn create_contract(keypair: &Keypair, contract_name: impl Into<String>) -> Result<Transaction, WalletError> {
    sign(keypair, Transaction::new_create(keypair.public_key().clone(), contract_name))
}

pub fn add_candidate(
    keypair: &Keypair,
    contract_name: impl Into<String>,
    candidate: impl Into<String>,
) -> Result<Transaction, WalletError> {
    sign(
        keypair,
        Transaction::new_add_candidate(keypair.public_key().clone(), contract_name, candidate),
    )
}

pub fn start_voting(keypair: &Keypair, contract_name: impl Into<String>) -> Result<Transaction, WalletError> {
    sign(keypair, Transaction::new_start_voting(keypair.public_key().clone(), contract_name))
}

pub fn vote(
    keypair: &Keypair,
    contract_name: impl Into<String>,
    subject: &PublicKey,
    candidate: impl Into<String>,
) -> Result<Transaction, WalletError> {
    sign(
        keypair,
        Transaction::new_vote(keypair.public_key().clone(), contract_name, subject, candidate),
    )
}

pub fn finish_voting(keypair: &Keypair, contract_name: impl Into<String>) -> Result<Transaction, WalletError> {
    sign(keypair, Transaction::new_finish_voting(keypair.public_key().clone(), contract_name))
}

fn sign(keypair: &Keypair, mut tx: Transaction) -> Result<Transaction, WalletError> {
    tx.sign(keypair.private_key())?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_transaction_verifies_under_the_signer() {
        let voter = Keypair::generate(512).unwrap();
        let subject = Keypair::generate(512).unwrap();
        let tx = vote(&voter, "election1", subject.public_key(), "alice").unwrap();
        assert!(tx.verify());
        assert_eq!(tx.vote_candidate().unwrap(), "alice");
    }
}
