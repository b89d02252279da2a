//! Signing drivers: run cosigners and aggregators over an authenticated relay

use super::aggregation::{AggregationParameters, SignatureAggregator};
use super::common::check_message;
use super::interactive::InteractiveCosigner;
use super::messages::SignRound1Broadcast;
use crate::curves::Ciphersuite;
use crate::encoding::point_to_bytes;
use crate::identity::{AuthKey, IdentityKey};
use crate::mpc::{Channel, Relay};
use crate::types::{
    CohortConfig, IdentityHash, PartialSignature, PublicKeyShares, SessionId, Shard, Signature,
};
use crate::Result;
use rand_core::{CryptoRng, RngCore};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Run one interactive FROST signing session as a cosigner
///
/// # Arguments
/// * `session_participants` - The `t` cohort members signing, this party included
/// * `message` - Message to sign, must not be empty
///
/// # Returns
/// `Some(signature)` if this party is a signature aggregator, `None` otherwise
#[instrument(skip_all, fields(session = %hex::encode(&session_id[..8]), suite = C::NAME))]
#[allow(clippy::too_many_arguments)]
pub async fn run_signing<C, A, K, R, G>(
    auth: &A,
    peers: &[K],
    cohort: &CohortConfig<C>,
    shard: &Shard<C>,
    session_participants: &[IdentityHash],
    session_id: SessionId,
    message: &[u8],
    relay: &R,
    rng: &mut G,
) -> Result<Option<Signature<C>>>
where
    C: Ciphersuite,
    A: AuthKey,
    K: IdentityKey,
    R: Relay,
    G: RngCore + CryptoRng + Send,
{
    check_message(message)?;
    let me = auth.hash();
    let mut cosigner = InteractiveCosigner::new(me, cohort.clone(), shard.clone(), session_participants)?;
    let members = cosigner.session_participants();
    let channel = Channel::new(auth, peers, relay, session_id);
    info!(signers = members.len(), "Starting signing");

    debug!("signing round 1: nonce commitments");
    let commitment = cosigner.round1(rng)?;
    channel.broadcast(1, &commitment).await?;
    let received: HashMap<IdentityHash, SignRound1Broadcast<C>> =
        channel.collect_broadcasts(1, &members).await?;

    debug!("signing round 2: partial signatures");
    let partial = cosigner.round2(&received, message)?;
    for aggregator in cohort.signature_aggregators() {
        if *aggregator != me {
            channel.send_direct(2, aggregator, &partial).await?;
        }
    }

    if !cosigner.is_signature_aggregator() {
        info!("partial signature delivered");
        return Ok(None);
    }

    let others: Vec<IdentityHash> = members.iter().filter(|id| **id != me).copied().collect();
    let partials: HashMap<IdentityHash, PartialSignature<C>> =
        channel.collect_direct(2, &others).await?;
    let signature = cosigner.aggregate(message, &partials)?;

    info!(r = %hex::encode(point_to_bytes(&signature.r)), "Signing completed successfully");
    Ok(Some(signature))
}

/// Aggregate a signing session this party does not cosign
///
/// Listens to the cosigners' nonce commitments and collects their partial
/// signatures; bad partials are attributed using `public_key_shares`.
#[instrument(skip_all, fields(session = %hex::encode(&session_id[..8]), suite = C::NAME))]
#[allow(clippy::too_many_arguments)]
pub async fn run_aggregation<C, A, K, R>(
    auth: &A,
    peers: &[K],
    cohort: &CohortConfig<C>,
    public_key_shares: &PublicKeyShares<C>,
    session_participants: &[IdentityHash],
    session_id: SessionId,
    message: &[u8],
    relay: &R,
) -> Result<Signature<C>>
where
    C: Ciphersuite,
    A: AuthKey,
    K: IdentityKey,
    R: Relay,
{
    check_message(message)?;
    let me = auth.hash();
    let channel = Channel::new(auth, peers, relay, session_id);

    let commitments: HashMap<IdentityHash, SignRound1Broadcast<C>> =
        channel.collect_broadcasts(1, session_participants).await?;
    let partials: HashMap<IdentityHash, PartialSignature<C>> =
        channel.collect_direct(2, session_participants).await?;

    SignatureAggregator::new(
        &me,
        cohort,
        public_key_shares.public_key,
        Some(public_key_shares),
        session_participants,
        message,
        AggregationParameters::from_commitments(commitments.into_iter().collect()),
    )?
    .aggregate(&partials)
}
