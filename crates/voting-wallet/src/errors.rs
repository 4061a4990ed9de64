use thiserror::Error;

/// Errors raised loading or saving a keypair on disk. Key generation and
/// PEM parsing failures come straight from `voting-crypto`; this crate adds
/// only the I/O failure mode of reading/writing the PEM file itself.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("failed to read keypair file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write keypair file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Crypto(#[from] voting_crypto::CryptoError),
}
