use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use voting_core::Block;
use voting_crypto::PublicKey;

use crate::peer::Peer;

/// The wire-representable shell of a `Validator`: identity and address,
/// with no timer state. Carried by `NEW_VALIDATOR` and by `REGISTER`-style
/// local bootstrap; a full `Validator` is reconstructed from it on the
/// receiving end, matching the original's `Validator.to_dict`/`from_dict`
/// pair minus the bits (`wait_time`, `validated_blocks`) that only ever
/// make sense locally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    pub identity: PublicKey,
    pub address: Peer,
}

impl From<&Validator> for ValidatorDescriptor {
    fn from(v: &Validator) -> Self {
        Self {
            identity: v.identity.clone(),
            address: v.address.clone(),
        }
    }
}

impl From<ValidatorDescriptor> for Validator {
    fn from(d: ValidatorDescriptor) -> Self {
        Validator::new(d.identity, d.address)
    }
}

/// Lower/upper bound (inclusive) of the uniform wait-time draw, in whole
/// seconds (§4.4, §6).
pub const WAIT_TIME_MIN: u64 = 1;
pub const WAIT_TIME_MAX: u64 = 10;

struct ValidatorState {
    wait_time: Option<f64>,
    block_to_add: Option<Block>,
    validated_blocks: Vec<Block>,
    /// Bumped by `stop_wait_timer` and by every `validate_block` call so an
    /// in-flight timer task can detect it has been superseded and become a
    /// no-op instead of endorsing a stale candidate.
    generation: u64,
}

/// A single validator's timer and endorsement bookkeeping (§4.4).
///
/// The same type represents both the node's own local validator (the one
/// `validate_block` is ever actually called on) and the roster's mirrors of
/// remote validators, whose `wait_time` is only ever set by inbound
/// `WAIT_TIME`/`ADD_ELAPSED_TIME` messages (see `voting-network`). A
/// validator is retained for the process lifetime once registered.
pub struct Validator {
    pub identity: PublicKey,
    pub address: Peer,
    state: Mutex<ValidatorState>,
}

impl Validator {
    pub fn new(identity: PublicKey, address: Peer) -> Self {
        Self {
            identity,
            address,
            state: Mutex::new(ValidatorState {
                wait_time: None,
                block_to_add: None,
                validated_blocks: Vec::new(),
                generation: 0,
            }),
        }
    }

    pub async fn wait_time(&self) -> Option<f64> {
        self.state.lock().await.wait_time
    }

    /// Draws a wait time uniformly from integer seconds `[WAIT_TIME_MIN, WAIT_TIME_MAX]`.
    pub async fn generate_wait_time(&self) -> f64 {
        let draw = rand::thread_rng().gen_range(WAIT_TIME_MIN..=WAIT_TIME_MAX) as f64;
        self.state.lock().await.wait_time = Some(draw);
        draw
    }

    /// Assigns a wait time learned from a remote validator's `WAIT_TIME` reply.
    pub async fn set_wait_time(&self, wait_time: f64) {
        self.state.lock().await.wait_time = Some(wait_time);
    }

    /// Equalization phase (§4.5 step 2): normalizes this validator's timer
    /// by the round's minimum draw.
    pub async fn add_seconds_to_wait_time(&self, seconds: f64) {
        let mut state = self.state.lock().await;
        if let Some(wt) = state.wait_time.as_mut() {
            *wt += seconds;
        }
    }

    /// Stores `block` as the candidate being timed and starts a one-shot
    /// timer for `wait_time` seconds. Per the original, a validator only
    /// ever times one candidate at a time: a second call while one is
    /// already in flight is ignored (returned receiver never resolves; it
    /// is dropped once the caller is done with it).
    ///
    /// On timer fire, `block` moves into `validated_blocks` and the
    /// returned channel yields it — the caller (the node's election-phase
    /// logic) is expected to attempt the guarded chain append at that
    /// point.
    pub fn validate_block(self: &Arc<Self>, block: Block) -> oneshot::Receiver<Block> {
        let (tx, rx) = oneshot::channel();
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let (wait_secs, generation) = {
                let mut state = this.state.lock().await;
                if state.block_to_add.is_some() {
                    debug!(address = %this.address, "validator already timing a candidate, ignoring");
                    return;
                }
                state.block_to_add = Some(block.clone());
                state.generation += 1;
                (state.wait_time.unwrap_or(0.0), state.generation)
            };

            tokio::time::sleep(Duration::from_secs_f64(wait_secs.max(0.0))).await;

            let mut state = this.state.lock().await;
            if state.generation != generation {
                debug!(address = %this.address, "wait timer superseded before firing");
                return;
            }
            if let Some(endorsed) = state.block_to_add.take() {
                state.validated_blocks.push(endorsed.clone());
                drop(state);
                let _ = tx.send(endorsed);
            }
        });
        rx
    }

    /// Cancels any in-flight timer and clears `wait_time` so the next round
    /// can redraw. Matches the original's `stop_wait_timer`, extended to
    /// also drop a pending (not-yet-fired) candidate.
    pub async fn stop_wait_timer(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.wait_time = None;
        state.block_to_add = None;
    }

    /// `true` iff `block` has already been endorsed by this validator.
    pub async fn has_endorsed(&self, block_hash: &str) -> bool {
        self.state
            .lock()
            .await
            .validated_blocks
            .iter()
            .any(|b| b.hash == block_hash)
    }

    pub async fn validated_blocks(&self) -> Vec<Block> {
        self.state.lock().await.validated_blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_core::Block;
    use voting_crypto::Keypair;

    fn peer() -> Peer {
        Peer::new("127.0.0.1", 9000)
    }

    #[tokio::test]
    async fn generate_wait_time_is_within_bounds() {
        let kp = Keypair::generate(512).unwrap();
        let v = Validator::new(kp.public_key().clone(), peer());
        let wt = v.generate_wait_time().await;
        assert!(wt >= WAIT_TIME_MIN as f64 && wt <= WAIT_TIME_MAX as f64);
        assert_eq!(v.wait_time().await, Some(wt));
    }

    #[tokio::test]
    async fn add_seconds_accumulates_onto_existing_wait_time() {
        let kp = Keypair::generate(512).unwrap();
        let v = Validator::new(kp.public_key().clone(), peer());
        v.set_wait_time(2.0).await;
        v.add_seconds_to_wait_time(3.0).await;
        assert_eq!(v.wait_time().await, Some(5.0));
    }

    #[tokio::test]
    async fn stop_wait_timer_clears_wait_time_and_candidate() {
        let kp = Keypair::generate(512).unwrap();
        let v = Arc::new(Validator::new(kp.public_key().clone(), peer()));
        v.set_wait_time(5.0).await;
        let _rx = v.validate_block(Block::genesis());
        v.stop_wait_timer().await;
        assert_eq!(v.wait_time().await, None);
    }

    #[tokio::test]
    async fn validate_block_endorses_after_wait_time_elapses() {
        let kp = Keypair::generate(512).unwrap();
        let v = Arc::new(Validator::new(kp.public_key().clone(), peer()));
        v.set_wait_time(0.0).await;
        let block = Block::genesis();
        let rx = v.validate_block(block.clone());
        let endorsed = rx.await.unwrap();
        assert_eq!(endorsed.hash, block.hash);
        assert!(v.has_endorsed(&block.hash).await);
    }

    #[tokio::test]
    async fn second_validate_block_while_one_in_flight_is_ignored() {
        let kp = Keypair::generate(512).unwrap();
        let v = Arc::new(Validator::new(kp.public_key().clone(), peer()));
        v.set_wait_time(60.0).await;
        let _first = v.validate_block(Block::genesis());
        let second = Block::with_timestamp(vec![], "1".to_string(), 1);
        let rx = v.validate_block(second);
        // Dropped without firing: the task returns early and the sender is
        // dropped, so awaiting errors rather than hanging.
        assert!(rx.await.is_err());
    }
}
