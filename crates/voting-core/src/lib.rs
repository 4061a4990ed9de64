//! The chain state machine: transactions, blocks, voting contracts, and the
//! deterministic admission/execution rules that tie them together.
//!
//! This crate has no network awareness — it is driven by `voting-network`,
//! which owns the actual peer set and wire protocol, and by `voting-consensus`,
//! which owns leader election. Everything here is synchronous except for the
//! single mutex that guards the chain tip, since admission and block commit
//! must be linearizable across concurrently admitting tasks.

pub mod block;
pub mod chain;
pub mod contract;
pub mod error;
pub mod status;
pub mod transaction;

pub use block::{is_valid_block, Block};
pub use chain::{Chain, ChainSnapshot};
pub use contract::{Contract, ContractError, ContractState};
pub use error::ChainError;
pub use status::Status;
pub use transaction::{ContractMethod, Transaction};

pub type Result<T> = std::result::Result<T, ChainError>;

/// Number of pending transactions that triggers a PoET round.
pub const BLOCK_CAPACITY: usize = 5;
