//! Error taxonomy for the Agora client.
//!
//! Every failure the core can produce maps to one of these variants so the
//! presentation layer can turn it into status text. None of them are meant
//! to abort the process: the CLI boundary catches and prints.

use thiserror::Error;

/// Result type for Agora operations
pub type AgoraResult<T> = Result<T, AgoraError>;

/// Agora client errors
#[derive(Debug, Error)]
pub enum AgoraError {
    /// A signed request was attempted with no stored identity.
    #[error("No identity on this device; run `agora enroll` first")]
    IdentityMissing,

    /// The Exchange rejected or failed the identity challenge request.
    #[error("Challenge request failed (status {status}): {body}")]
    ChallengeFailed { status: u16, body: String },

    /// The Exchange rejected the identity creation request.
    #[error("Identity creation failed (status {status}): {body}")]
    IdentityCreateFailed { status: u16, body: String },

    /// No stamp available and minting failed or was impossible.
    #[error("No voting stamp available and minting failed")]
    StampExhausted,

    /// A chosen label or option id does not exist on the poll.
    #[error("Option not found on poll: {0}")]
    InvalidOption(String),

    /// Transport-level failure talking to the Exchange.
    #[error("Network error: {0}")]
    Network(String),

    /// The Exchange rejected a vote credential (stale stamp or revoked
    /// voter token). The stored credential must be cleared so the next
    /// vote re-acquires one.
    #[error("Vote credential rejected by the Exchange")]
    InvalidCredential,

    /// The Exchange answered with a shape or status we cannot use.
    #[error("Unexpected Exchange response: {0}")]
    Api(String),

    /// Device-local store failure (I/O or serialization).
    #[error("Store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for AgoraError {
    fn from(err: reqwest::Error) -> Self {
        AgoraError::Network(err.to_string())
    }
}
