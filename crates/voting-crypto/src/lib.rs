//! RSA signing envelope and the canonical hash helpers shared by the chain
//! and network crates.
//!
//! Keys, signatures and block hashes all cross the wire as hex strings
//! (see the wire format described by the voting spec), so this crate's
//! job is to make "the thing that goes over the wire" and "the thing
//! `rsa`/`sha2` operate on" interconvertible without leaking either
//! library's types into callers that only care about hex.

pub mod error;
pub mod hash;
pub mod keypair;

pub use error::CryptoError;
pub use hash::sha256_hex;
pub use keypair::{Keypair, PrivateKey, PublicKey};

pub type Result<T> = std::result::Result<T, CryptoError>;
