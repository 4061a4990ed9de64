use thiserror::Error;

/// Errors surfaced across the HTTP boundary (§6's request API surface).
/// This is a façade, not a participant in consensus — every variant here
/// maps to a 4xx/5xx response, never to the core's own boolean
/// admission/validation contract.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("invalid hex-encoded public key: {0}")]
    InvalidPublicKey(String),

    #[error("validator already registered")]
    ValidatorAlreadyRegistered,

    #[error(transparent)]
    Chain(#[from] voting_core::ChainError),

    #[error(transparent)]
    Contract(#[from] voting_core::ContractError),

    #[error(transparent)]
    Crypto(#[from] voting_crypto::CryptoError),
}

impl From<voting_consensus::ConsensusError> for RpcError {
    fn from(_: voting_consensus::ConsensusError) -> Self {
        RpcError::ValidatorAlreadyRegistered
    }
}
