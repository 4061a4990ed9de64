//! `Peer` is `voting_consensus::Peer` re-exported — see that crate's
//! `peer.rs` for why the `(host, port)` address type lives below this
//! crate in the dependency graph instead of here.

pub use voting_consensus::Peer;
