use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::error::ConsensusError;
use crate::peer::Peer;
use crate::validator::Validator;

/// The per-node validator roster driving a PoET round (§4.5).
///
/// Holds every validator this node knows about — its own local validator
/// plus a mirror of each remote validator's address, identity and wait
/// time — and the bookkeeping the round orchestration needs: waiting for
/// every validator to have drawn a wait time, and computing/broadcasting
/// the equalization delta. `voting-network`'s node drives the actual wire
/// round-trips (`GENERATE_WAIT_TIME`/`WAIT_TIME`/`ADD_ELAPSED_TIME`); this
/// type is the network-agnostic bookkeeping the original source's
/// `are_all_validators_have_wait_time` busy-wait loop replaces, per
/// SPEC_FULL.md's rewrite of that idiom onto `tokio::sync::Notify`.
pub struct Roster {
    inner: Mutex<RosterInner>,
    wait_times_ready: Notify,
}

struct RosterInner {
    local: Option<Arc<Validator>>,
    validators: Vec<Arc<Validator>>,
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

impl Roster {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RosterInner {
                local: None,
                validators: Vec::new(),
            }),
            wait_times_ready: Notify::new(),
        }
    }

    /// Registers this node's own validator. At most one local validator may
    /// be registered; a second call with a distinct address is rejected.
    pub async fn register_local(&self, validator: Arc<Validator>) -> Result<(), ConsensusError> {
        let mut inner = self.inner.lock().await;
        if inner.validators.iter().any(|v| v.address == validator.address) {
            return Err(ConsensusError::AlreadyRegistered(validator.address.to_string()));
        }
        inner.local = Some(Arc::clone(&validator));
        inner.validators.push(validator);
        Ok(())
    }

    /// Adds a remote validator descriptor, idempotent by address.
    pub async fn add_remote(&self, validator: Arc<Validator>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.validators.iter().any(|v| v.address == validator.address) {
            return false;
        }
        inner.validators.push(validator);
        true
    }

    pub async fn local(&self) -> Option<Arc<Validator>> {
        self.inner.lock().await.local.clone()
    }

    pub async fn all(&self) -> Vec<Arc<Validator>> {
        self.inner.lock().await.validators.clone()
    }

    pub async fn remotes(&self) -> Vec<Arc<Validator>> {
        let inner = self.inner.lock().await;
        inner
            .validators
            .iter()
            .filter(|v| Some(v.address.clone()) != inner.local.as_ref().map(|l| l.address.clone()))
            .cloned()
            .collect()
    }

    pub async fn find_by_address(&self, address: &Peer) -> Option<Arc<Validator>> {
        self.inner
            .lock()
            .await
            .validators
            .iter()
            .find(|v| &v.address == address)
            .cloned()
    }

    /// Sets the wait time learned from a remote validator's `WAIT_TIME`
    /// reply, then wakes anyone waiting on `wait_for_all_wait_times`.
    pub async fn record_wait_time(&self, address: &Peer, wait_time: f64) -> bool {
        let Some(validator) = self.find_by_address(address).await else {
            return false;
        };
        validator.set_wait_time(wait_time).await;
        self.wait_times_ready.notify_waiters();
        true
    }

    /// Equalization phase (§4.5 step 2): applies `delta` to every
    /// validator's wait time.
    pub async fn add_elapsed_time_to_all(&self, delta: f64) {
        for v in self.all().await {
            v.add_seconds_to_wait_time(delta).await;
        }
    }

    async fn all_have_wait_time(&self) -> bool {
        for v in self.all().await {
            if v.wait_time().await.is_none() {
                return false;
            }
        }
        true
    }

    /// Replaces the original's `while not are_all_validators_have_wait_time: pass`
    /// busy-wait with a `Notify`-driven wait, re-checking after every
    /// `record_wait_time` call until every validator (including self) has a
    /// drawn wait time.
    ///
    /// Registers as a waiter (via `enable()`) before checking the condition,
    /// not after — otherwise a `record_wait_time` landing between the check
    /// and the `.await` would call `notify_waiters()` with nobody registered
    /// yet to wake, and this would block forever on the very last validator
    /// to report in.
    pub async fn wait_for_all_wait_times(&self) {
        loop {
            let notified = self.wait_times_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.all_have_wait_time().await {
                return;
            }
            notified.await;
        }
    }

    /// The round's minimum drawn wait time, used for equalization (§4.5 step 2).
    pub async fn min_wait_time(&self) -> Option<f64> {
        let mut min = None;
        for v in self.all().await {
            if let Some(wt) = v.wait_time().await {
                min = Some(match min {
                    Some(m) if m < wt => m,
                    _ => wt,
                });
            }
        }
        min
    }

    /// Commit side-effects (§4.5 step 5): stops every validator's timer so
    /// the next round can redraw.
    pub async fn stop_all_timers(&self) {
        for v in self.all().await {
            v.stop_wait_timer().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voting_crypto::Keypair;

    fn validator(port: u16) -> Arc<Validator> {
        let kp = Keypair::generate(512).unwrap();
        Arc::new(Validator::new(kp.public_key().clone(), Peer::new("127.0.0.1", port)))
    }

    #[tokio::test]
    async fn register_local_then_add_remote_are_both_visible() {
        let roster = Roster::new();
        let local = validator(9000);
        let remote = validator(9001);
        roster.register_local(local.clone()).await.unwrap();
        assert!(roster.add_remote(remote.clone()).await);
        assert_eq!(roster.all().await.len(), 2);
        assert_eq!(roster.remotes().await.len(), 1);
        assert_eq!(roster.local().await.unwrap().address, local.address);
    }

    #[tokio::test]
    async fn duplicate_address_is_rejected() {
        let roster = Roster::new();
        let local = validator(9000);
        roster.register_local(local.clone()).await.unwrap();
        let same_addr = validator(9000);
        assert!(!roster.add_remote(same_addr).await);
    }

    #[tokio::test]
    async fn wait_for_all_wait_times_unblocks_once_every_validator_has_drawn() {
        let roster = Roster::new();
        let local = validator(9100);
        let remote = validator(9101);
        roster.register_local(local.clone()).await.unwrap();
        roster.add_remote(remote.clone()).await;
        local.generate_wait_time().await;

        let roster = Arc::new(roster);
        let roster_for_wait = Arc::clone(&roster);
        let handle = tokio::spawn(async move {
            roster_for_wait.wait_for_all_wait_times().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        roster.record_wait_time(&remote.address, 3.0).await;
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn min_wait_time_picks_the_smallest_draw() {
        let roster = Roster::new();
        let a = validator(9000);
        let b = validator(9001);
        a.set_wait_time(7.0).await;
        b.set_wait_time(2.0).await;
        roster.register_local(a).await.unwrap();
        roster.add_remote(b).await;
        assert_eq!(roster.min_wait_time().await, Some(2.0));
    }
}
