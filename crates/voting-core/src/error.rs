use thiserror::Error;

/// Errors raised by fallible, non-rejection operations: a rejection (an
/// invalid transaction, an invalid block) is expressed as `false`/`IGNORED`
/// per the admission predicate's boolean contract, not as an `Err` — these
/// are reserved for things that should not happen under a well-formed peer.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("invalid block hash")]
    InvalidBlockHash,

    #[error("invalid block link")]
    InvalidBlockLink,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
