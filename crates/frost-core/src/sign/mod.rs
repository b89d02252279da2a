//! FROST threshold Schnorr signing
//!
//! [`InteractiveCosigner`] runs the three-round protocol (nonce commitment,
//! partial signature, aggregation). [`PreGenParticipant`] and
//! [`NonInteractiveCosigner`] move the nonce round ahead of time so signing
//! takes a single round. [`SignatureAggregator`] serves aggregators that
//! do not cosign. [`run_signing`] and [`run_aggregation`] drive them over a relay.

mod aggregation;
mod common;
mod dsg;
mod interactive;
mod messages;
mod noninteractive;

pub use aggregation::{AggregationParameters, SignatureAggregator};
pub use dsg::{run_aggregation, run_signing};
pub use interactive::InteractiveCosigner;
pub use messages::{NonceCommitment, NoncePair, SignRound1Broadcast};
pub use noninteractive::{
    NonInteractiveCosigner, PreGenParticipant, PreGenRound1Broadcast, PreSignature,
    PreSignatureBatch, PrivateNoncePairs,
};
