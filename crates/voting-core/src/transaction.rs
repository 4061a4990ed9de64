use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use voting_crypto::{PrivateKey, PublicKey};

/// The five contract methods a transaction may invoke. Serialized in the
/// screaming-snake-case spelling used by the wire protocol's `type`/`method`
/// discriminators (`CREATE`, `ADD_CANDIDATE`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractMethod {
    Create,
    AddCandidate,
    StartVoting,
    Vote,
    FinishVoting,
}

impl ContractMethod {
    fn as_str(&self) -> &'static str {
        match self {
            ContractMethod::Create => "CREATE",
            ContractMethod::AddCandidate => "ADD_CANDIDATE",
            ContractMethod::StartVoting => "START_VOTING",
            ContractMethod::Vote => "VOTE",
            ContractMethod::FinishVoting => "FINISH_VOTING",
        }
    }
}

/// A signed intent to invoke one contract method.
///
/// `args` carries the method-specific argument tuple as plain strings,
/// exactly as it crosses the wire: empty for CREATE/START_VOTING/FINISH_VOTING,
/// `[candidate]` for ADD_CANDIDATE, `[hex(voter_key), candidate]` for VOTE.
/// Equality, hashing and serialization cover every field including the
/// signature, matching the admission predicate's duplicate-suppression rule.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub voter_key: PublicKey,
    pub contract_name: String,
    pub contract_method: ContractMethod,
    pub args: Vec<String>,
    pub timestamp: f64,
    #[serde(with = "hex_signature")]
    pub signature: Option<Vec<u8>>,
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.voter_key == other.voter_key
            && self.contract_name == other.contract_name
            && self.contract_method == other.contract_method
            && self.args == other.args
            && self.timestamp.to_bits() == other.timestamp.to_bits()
            && self.signature == other.signature
    }
}
impl Eq for Transaction {}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.voter_key.hash(state);
        self.contract_name.hash(state);
        self.contract_method.hash(state);
        self.args.hash(state);
        self.timestamp.to_bits().hash(state);
        self.signature.hash(state);
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}

impl Transaction {
    fn unsigned(
        voter_key: PublicKey,
        contract_name: impl Into<String>,
        contract_method: ContractMethod,
        args: Vec<String>,
        timestamp: Option<f64>,
    ) -> Self {
        Self {
            voter_key,
            contract_name: contract_name.into(),
            contract_method,
            args,
            timestamp: timestamp.unwrap_or_else(now_secs),
            signature: None,
        }
    }

    pub fn new_create(voter_key: PublicKey, contract_name: impl Into<String>) -> Self {
        Self::unsigned(voter_key, contract_name, ContractMethod::Create, vec![], None)
    }

    pub fn new_add_candidate(
        voter_key: PublicKey,
        contract_name: impl Into<String>,
        candidate: impl Into<String>,
    ) -> Self {
        Self::unsigned(
            voter_key,
            contract_name,
            ContractMethod::AddCandidate,
            vec![candidate.into()],
            None,
        )
    }

    pub fn new_start_voting(voter_key: PublicKey, contract_name: impl Into<String>) -> Self {
        Self::unsigned(voter_key, contract_name, ContractMethod::StartVoting, vec![], None)
    }

    pub fn new_vote(
        voter_key: PublicKey,
        contract_name: impl Into<String>,
        subject: &PublicKey,
        candidate: impl Into<String>,
    ) -> Self {
        Self::unsigned(
            voter_key,
            contract_name,
            ContractMethod::Vote,
            vec![subject.to_hex(), candidate.into()],
            None,
        )
    }

    pub fn new_finish_voting(voter_key: PublicKey, contract_name: impl Into<String>) -> Self {
        Self::unsigned(voter_key, contract_name, ContractMethod::FinishVoting, vec![], None)
    }

    /// The subject of a VOTE transaction (args[0]), if this is a VOTE.
    pub fn vote_subject(&self) -> Option<PublicKey> {
        if self.contract_method != ContractMethod::Vote {
            return None;
        }
        self.args.first().and_then(|s| PublicKey::from_hex(s).ok())
    }

    /// The chosen candidate of a VOTE transaction (args[1]), if this is a VOTE.
    pub fn vote_candidate(&self) -> Option<&str> {
        if self.contract_method != ContractMethod::Vote {
            return None;
        }
        self.args.get(1).map(|s| s.as_str())
    }

    /// The candidate name carried by an ADD_CANDIDATE transaction (args[0]).
    pub fn add_candidate_name(&self) -> Option<&str> {
        if self.contract_method != ContractMethod::AddCandidate {
            return None;
        }
        self.args.first().map(|s| s.as_str())
    }

    /// `hex(voter_key) ‖ contract_name ‖ method ‖ repr(args) ‖ timestamp`,
    /// the exact byte string both the signer and every verifier compute.
    pub fn canonical_signing_string(&self) -> String {
        format!(
            "{}{}{}{:?}{}",
            self.voter_key.to_hex(),
            self.contract_name,
            self.contract_method.as_str(),
            self.args,
            self.timestamp
        )
    }

    pub fn sign(&mut self, private_key: &PrivateKey) -> voting_crypto::Result<()> {
        let message = self.canonical_signing_string();
        self.signature = Some(private_key.sign(message.as_bytes())?);
        Ok(())
    }

    /// `true` iff `signature` is present and verifies under `voter_key`.
    pub fn verify(&self) -> bool {
        match &self.signature {
            Some(sig) => self
                .voter_key
                .verify(self.canonical_signing_string().as_bytes(), sig),
            None => false,
        }
    }
}

mod hex_signature {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        sig: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match sig {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let opt = Option::<String>::deserialize(deserializer)?;
        opt.map(|s| hex::decode(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_crypto::Keypair;

    #[test]
    fn signed_transaction_verifies() {
        let kp = Keypair::generate(512).unwrap();
        let mut tx = Transaction::new_create(kp.public_key().clone(), "election1");
        tx.sign(kp.private_key()).unwrap();
        assert!(tx.verify());
    }

    #[test]
    fn unsigned_transaction_does_not_verify() {
        let kp = Keypair::generate(512).unwrap();
        let tx = Transaction::new_create(kp.public_key().clone(), "election1");
        assert!(!tx.verify());
    }

    #[test]
    fn tampered_contract_name_fails_verification() {
        let kp = Keypair::generate(512).unwrap();
        let mut tx = Transaction::new_create(kp.public_key().clone(), "election1");
        tx.sign(kp.private_key()).unwrap();
        tx.contract_name = "election2".to_string();
        assert!(!tx.verify());
    }

    #[test]
    fn vote_args_roundtrip() {
        let voter = Keypair::generate(512).unwrap();
        let subject = Keypair::generate(512).unwrap();
        let tx = Transaction::new_vote(
            voter.public_key().clone(),
            "election1",
            subject.public_key(),
            "alice",
        );
        assert_eq!(tx.vote_subject().unwrap(), *subject.public_key());
        assert_eq!(tx.vote_candidate().unwrap(), "alice");
    }

    #[test]
    fn json_roundtrip_preserves_equality() {
        let kp = Keypair::generate(512).unwrap();
        let mut tx = Transaction::new_add_candidate(kp.public_key().clone(), "election1", "alice");
        tx.sign(kp.private_key()).unwrap();

        let json = serde_json::to_string(&tx).unwrap();
        let restored: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, restored);
        assert!(restored.verify());
    }
}
