//! Message transport for running the protocols between parties
//!
//! The protocol state machines are pure; this module moves their messages.
//! [`Relay`] is the untrusted store-and-forward layer, [`Channel`] wraps it
//! with per-message authentication under each member's identity key.

use crate::types::{IdentityHash, SessionId};
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};

pub use ::async_trait::async_trait;

mod channel;
/// In-memory relay for testing and local simulation
pub mod memory;

pub use channel::{Channel, Envelope, DEFAULT_TIMEOUT};
pub use memory::MemoryRelay;

/// Message relay trait for MPC communication
#[async_trait]
pub trait Relay: Send + Sync {
    /// Broadcast a message to all parties
    async fn broadcast<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        message: &T,
    ) -> Result<()>;

    /// Send a direct message to a specific party
    async fn send_direct<T: Serialize + Send + Sync>(
        &self,
        session_id: &SessionId,
        round: u32,
        to: &IdentityHash,
        message: &T,
    ) -> Result<()>;

    /// Wait for `count` broadcast messages of a round
    async fn collect_broadcasts<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        count: usize,
    ) -> Result<Vec<T>>;

    /// Wait for `count` direct messages of a round sent to `me`
    async fn collect_direct<T: DeserializeOwned + Send>(
        &self,
        session_id: &SessionId,
        round: u32,
        me: &IdentityHash,
        count: usize,
    ) -> Result<Vec<T>>;
}
