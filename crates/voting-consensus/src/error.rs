use thiserror::Error;

/// Errors raised by the consensus crate's own fallible operations.
///
/// Round-orchestration rejections (a stale wait-time reply, a losing
/// validator) are not errors — they're the protocol working as intended —
/// so they surface as `bool`/`Option`, matching `voting-core`'s admission
/// predicate convention.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("validator {0} is already registered")]
    AlreadyRegistered(String),

    #[error("no local validator has been registered on this node")]
    NoLocalValidator,
}
