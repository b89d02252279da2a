//! # FROST Core
//!
//! Threshold Schnorr signatures over Edwards25519, secp256k1 and P-256.
//!
//! This crate provides:
//! - Shamir and Feldman secret sharing
//! - Pedersen Distributed Key Generation (DKG) and proactive key refresh
//! - FROST signing, interactive or with precomputed nonces
//! - Signature aggregation with identifiable abort
//!
//! ## Protocol Overview
//!
//! The protocols are pure state machines: every round takes the messages a
//! party received and returns the messages it sends, and calling a round out
//! of order is an error. A misbehaving peer is named in
//! [`Error::IdentifiableAbort`] whenever the misbehaviour is provable.
//! Signatures are plain Schnorr signatures; with [`curves::Ed25519Sha512`]
//! they verify as RFC 8032 Ed25519 signatures.
//!
//! The [`mpc`] module carries messages between parties and the `run_*`
//! drivers in [`keygen`] and [`sign`] run whole protocols over it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frost_core::{keygen, sign};
//!
//! // Run distributed key generation
//! let shard = keygen::run_dkg(&auth, &peers, &cohort, session_id, &relay, &mut rng).await?;
//!
//! // Sign a message
//! let signature = sign::run_signing(
//!     &auth, &peers, &cohort, &shard, &signers, session_id, message, &relay, &mut rng,
//! ).await?;
//! ```

pub mod curves;
pub mod dlog;
pub mod encoding;
pub mod error;
pub mod identity;
pub mod keygen;
pub mod mpc;
pub mod schnorr;
pub mod sharing;
pub mod sign;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use curves::{Ciphersuite, CurveId, Ed25519Sha512, P256Sha256, Secp256k1Sha256};
pub use error::{Error, Result};
pub use identity::{AuthKey, Ed25519AuthKey, Ed25519IdentityKey, IdentityKey};
pub use types::{
    CohortConfig, IdentityHash, PartialSignature, PublicKeyShares, SessionId, Shard, SharingId,
    Signature, SigningKeyShare,
};

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
