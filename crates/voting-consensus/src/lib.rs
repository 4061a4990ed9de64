//! PoET leader election (§4.4–§4.5): a validator's wait timer and
//! endorsement bookkeeping, and the per-node roster that drives a round's
//! draw/equalization phases.
//!
//! Nothing here opens a socket — `voting-network`'s node drives the actual
//! `GENERATE_WAIT_TIME`/`WAIT_TIME`/`ADD_ELAPSED_TIME`/`VALIDATE_NEW_BLOCK`
//! round-trips over the wire and owns the chain append; this crate only
//! knows how to draw, equalize and endorse.

pub mod error;
pub mod peer;
pub mod roster;
pub mod validator;

pub use error::ConsensusError;
pub use peer::Peer;
pub use roster::Roster;
pub use validator::{Validator, ValidatorDescriptor, WAIT_TIME_MAX, WAIT_TIME_MIN};
