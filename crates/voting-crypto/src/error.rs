use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}
