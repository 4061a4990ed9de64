pub mod errors;
pub mod keypair;
pub mod transaction;

pub use errors::WalletError;
pub use voting_crypto::Keypair;
