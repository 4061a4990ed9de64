use serde::{Deserialize, Serialize};

/// Outcome of admitting a transaction (or re-admitting one during sync).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The pending pool just reached `BLOCK_CAPACITY`; a PoET round is due.
    NewBlock,
    /// Accepted into the pending pool, no round triggered yet.
    NewTransaction,
    /// Silently rejected by the admission predicate.
    Ignored,
}
