//! DKG driver: runs a [`Participant`] over an authenticated relay

use super::participant::Participant;
use crate::curves::Ciphersuite;
use crate::identity::{AuthKey, IdentityKey};
use crate::mpc::{Channel, Relay};
use crate::types::{CohortConfig, IdentityHash, PublicKeyShares, SessionId, Shard, SigningKeyShare};
use crate::Result;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, info, instrument};

/// Run the distributed key generation protocol
///
/// # Arguments
/// * `auth` - This party's identity key, used to sign every message
/// * `peers` - Identity keys of all cohort members
/// * `cohort` - Cohort the key is generated for
/// * `relay` - Message relay for communication
///
/// # Returns
/// The party's validated shard after successful DKG
#[instrument(skip_all, fields(session = %hex::encode(&session_id[..8]), suite = C::NAME))]
pub async fn run_dkg<C, A, K, R, G>(
    auth: &A,
    peers: &[K],
    cohort: &CohortConfig<C>,
    session_id: SessionId,
    relay: &R,
    rng: &mut G,
) -> Result<Shard<C>>
where
    C: Ciphersuite,
    A: AuthKey,
    K: IdentityKey,
    R: Relay,
    G: RngCore + CryptoRng + Send,
{
    info!(
        n_parties = cohort.total_parties(),
        threshold = cohort.threshold(),
        "Starting DKG"
    );

    let participant = Participant::new(auth.hash(), cohort.clone(), session_id)?;
    let (signing_key_share, public_key_shares) =
        exchange(participant, auth, peers, session_id, relay, rng).await?;

    let shard = Shard {
        signing_key_share,
        public_key_shares,
    };
    shard.validate(cohort, &auth.hash())?;

    info!("DKG completed successfully");
    Ok(shard)
}

/// Both DKG rounds of one participant, shared with key refresh
pub(super) async fn exchange<C, A, K, R, G>(
    mut participant: Participant<C>,
    auth: &A,
    peers: &[K],
    session_id: SessionId,
    relay: &R,
    rng: &mut G,
) -> Result<(SigningKeyShare<C>, PublicKeyShares<C>)>
where
    C: Ciphersuite,
    A: AuthKey,
    K: IdentityKey,
    R: Relay,
    G: RngCore + CryptoRng + Send,
{
    let channel = Channel::new(auth, peers, relay, session_id);
    let me = *channel.me();

    debug!("DKG round 1: dealing");
    let (broadcast, p2p) = participant.round1(rng)?;
    channel.broadcast(1, &broadcast).await?;
    for (to, message) in &p2p {
        channel.send_direct(1, to, message).await?;
    }
    drop(p2p);

    debug!("DKG round 2: verifying dealers");
    let everyone = participant.cohort().participants().to_vec();
    let others: Vec<IdentityHash> = everyone.iter().filter(|id| **id != me).copied().collect();
    let broadcasts = channel.collect_broadcasts(1, &everyone).await?;
    let received = channel.collect_direct(1, &others).await?;

    participant.round2(&broadcasts, received)
}
