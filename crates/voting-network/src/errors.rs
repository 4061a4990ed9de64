use thiserror::Error;

/// Errors raised by the framing/transport layer itself (§7:
/// `PeerUnreachable`, `MalformedMessage`). A rejected or invalid inbound
/// message is never one of these — it's logged and dropped per §7's
/// "nothing is fatal to the node" policy, not surfaced as an `Err`.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("connection timed out")]
    Timeout,
}
