//! Error types for threshold Schnorr operations

use crate::types::SharingId;
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during DKG and signing
///
/// The variants split into four kinds: caller misuse (`InvalidConfig`,
/// `InvalidArgument`, `InvalidRound`, `NonceReuse`), absent peer input
/// (`Missing`, `Timeout`), provable misbehaviour (`IdentifiableAbort`) and
/// non-attributable inconsistencies (`Failed`).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cohort or session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed argument supplied by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A round was invoked out of sequence
    #[error("Invalid round: {0}")]
    InvalidRound(String),

    /// A peer message or a required value is absent
    #[error("Missing: {0}")]
    Missing(String),

    /// A specific party provably deviated from the protocol
    #[error("Identifiable abort by party {culprit}: {reason}")]
    IdentifiableAbort { culprit: SharingId, reason: String },

    /// Two values that must agree by construction did not
    #[error("Protocol failed: {0}")]
    Failed(String),

    /// Proof or share verification failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// A precomputed nonce pair was requested a second time
    #[error("Nonce pair {0} was already consumed")]
    NonceReuse(usize),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Network/relay error
    #[error("Relay error: {0}")]
    Relay(String),

    /// Timeout waiting for message
    #[error("Timeout waiting for {0}")]
    Timeout(String),

    /// Invalid signature
    #[error("Invalid signature")]
    InvalidSignature,
}

impl Error {
    pub(crate) fn abort(culprit: SharingId, reason: impl Into<String>) -> Self {
        Error::IdentifiableAbort {
            culprit,
            reason: reason.into(),
        }
    }

    /// The party blamed by an identifiable abort, if any
    pub fn culprit(&self) -> Option<SharingId> {
        match self {
            Error::IdentifiableAbort { culprit, .. } => Some(*culprit),
            _ => None,
        }
    }

    /// Whether the error attributes fault to a specific party
    pub fn is_identifiable_abort(&self) -> bool {
        matches!(self, Error::IdentifiableAbort { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
