use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use voting_crypto::PublicKey;

/// Lifecycle state of a voting contract. Transitions are one-way:
/// `NotStarted -> InProgress -> Finished`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    NotStarted,
    InProgress,
    Finished,
}

/// A single named election: an insertion-ordered set of candidates with
/// vote tallies, and a map from voter identity to the candidate they chose.
///
/// Invariants maintained by construction (never by post-hoc repair):
/// - candidate names are unique within a contract;
/// - each voter key appears in `votes` at most once;
/// - `candidates[c]` always equals the number of `votes` entries equal to `c`;
/// - `state` only ever moves forward.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub candidates: IndexMap<String, u64>,
    pub votes: HashMap<PublicKey, String>,
    pub state: ContractState,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ContractError {
    #[error("candidate {0} already exists")]
    CandidateExists(String),
    #[error("candidate {0} does not exist")]
    CandidateMissing(String),
    #[error("voter already voted")]
    AlreadyVoted,
    #[error("voting has not started")]
    NotStarted,
    #[error("voting has already finished")]
    AlreadyFinished,
    #[error("voting is not finished yet")]
    NotFinished,
    #[error("voting is not in progress")]
    NotInProgress,
}

impl Contract {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: IndexMap::new(),
            votes: HashMap::new(),
            state: ContractState::NotStarted,
        }
    }

    pub fn has_candidate(&self, candidate: &str) -> bool {
        self.candidates.contains_key(candidate)
    }

    pub fn has_voted(&self, voter: &PublicKey) -> bool {
        self.votes.contains_key(voter)
    }

    pub fn is_in_progress(&self) -> bool {
        self.state == ContractState::InProgress
    }

    pub fn is_finished(&self) -> bool {
        self.state == ContractState::Finished
    }

    pub fn add_candidate(&mut self, candidate: &str) -> Result<(), ContractError> {
        if self.candidates.contains_key(candidate) {
            return Err(ContractError::CandidateExists(candidate.to_string()));
        }
        self.candidates.insert(candidate.to_string(), 0);
        Ok(())
    }

    pub fn start_voting(&mut self) -> Result<(), ContractError> {
        if self.state != ContractState::NotStarted {
            return Err(ContractError::NotStarted);
        }
        self.state = ContractState::InProgress;
        Ok(())
    }

    pub fn finish_voting(&mut self) -> Result<(), ContractError> {
        if self.state != ContractState::InProgress {
            return Err(ContractError::NotInProgress);
        }
        self.state = ContractState::Finished;
        Ok(())
    }

    pub fn vote(&mut self, voter_key: &PublicKey, candidate: &str) -> Result<(), ContractError> {
        if !self.candidates.contains_key(candidate) {
            return Err(ContractError::CandidateMissing(candidate.to_string()));
        }
        if self.votes.contains_key(voter_key) {
            return Err(ContractError::AlreadyVoted);
        }
        match self.state {
            ContractState::NotStarted => return Err(ContractError::NotStarted),
            ContractState::Finished => return Err(ContractError::AlreadyFinished),
            ContractState::InProgress => {}
        }
        self.votes.insert(voter_key.clone(), candidate.to_string());
        *self.candidates.get_mut(candidate).expect("checked above") += 1;
        Ok(())
    }

    pub fn results(&self) -> Result<IndexMap<String, u64>, ContractError> {
        if !self.is_finished() {
            return Err(ContractError::NotFinished);
        }
        Ok(self.candidates.clone())
    }

    pub fn winner(&self) -> Result<Option<String>, ContractError> {
        if !self.is_finished() {
            return Err(ContractError::NotFinished);
        }
        Ok(self
            .candidates
            .iter()
            .max_by_key(|(_, tally)| **tally)
            .map(|(name, _)| name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_tallies_track_votes() {
        let mut c = Contract::new("election1");
        c.add_candidate("alice").unwrap();
        c.add_candidate("bob").unwrap();
        c.start_voting().unwrap();

        let voter = voting_crypto::Keypair::generate(512).unwrap();
        c.vote(voter.public_key(), "alice").unwrap();

        assert_eq!(c.candidates["alice"], 1);
        assert_eq!(c.candidates["bob"], 0);
        assert_eq!(c.votes.len(), 1);
    }

    #[test]
    fn double_vote_is_rejected() {
        let mut c = Contract::new("election1");
        c.add_candidate("alice").unwrap();
        c.add_candidate("bob").unwrap();
        c.start_voting().unwrap();

        let voter = voting_crypto::Keypair::generate(512).unwrap();
        c.vote(voter.public_key(), "alice").unwrap();
        let err = c.vote(voter.public_key(), "bob").unwrap_err();
        assert_eq!(err, ContractError::AlreadyVoted);
        assert_eq!(c.candidates["bob"], 0);
    }

    #[test]
    fn vote_before_start_is_rejected() {
        let mut c = Contract::new("election1");
        c.add_candidate("alice").unwrap();
        let voter = voting_crypto::Keypair::generate(512).unwrap();
        assert_eq!(
            c.vote(voter.public_key(), "alice").unwrap_err(),
            ContractError::NotStarted
        );
    }

    #[test]
    fn add_candidate_after_start_rejected_by_caller() {
        // add_candidate itself doesn't gate on state; the admission predicate
        // does (see chain.rs). Contract-level re-adding the same name is
        // always rejected regardless of state.
        let mut c = Contract::new("election1");
        c.add_candidate("alice").unwrap();
        assert_eq!(
            c.add_candidate("alice").unwrap_err(),
            ContractError::CandidateExists("alice".to_string())
        );
    }

    #[test]
    fn results_and_winner_require_finished_state() {
        let mut c = Contract::new("election1");
        c.add_candidate("alice").unwrap();
        c.add_candidate("bob").unwrap();
        c.start_voting().unwrap();
        let voter = voting_crypto::Keypair::generate(512).unwrap();
        c.vote(voter.public_key(), "alice").unwrap();

        assert_eq!(c.results().unwrap_err(), ContractError::NotFinished);
        c.finish_voting().unwrap();
        let results = c.results().unwrap();
        assert_eq!(results["alice"], 1);
        assert_eq!(results["bob"], 0);
        assert_eq!(c.winner().unwrap(), Some("alice".to_string()));
    }
}
