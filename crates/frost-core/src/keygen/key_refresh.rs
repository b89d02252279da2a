//! Proactive share refresh
//!
//! Parties run the DKG sharing zero and add the result to their shard. The
//! group key is unchanged while every share, public key share and combined
//! commitment moves, so shares leaked before the refresh are useless against
//! shares taken after it.

use super::dkg::exchange;
use super::participant::Participant;
use crate::curves::{is_identity, Ciphersuite};
use crate::identity::{AuthKey, IdentityKey};
use crate::mpc::Relay;
use crate::types::{CohortConfig, IdentityHash, PublicKeyShares, SessionId, Shard, SigningKeyShare};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use tracing::{info, instrument};

impl<C: Ciphersuite> Shard<C> {
    /// Add the output of a zero-sharing DKG to this shard
    pub fn refresh(
        &self,
        delta_share: &SigningKeyShare<C>,
        delta_public: &PublicKeyShares<C>,
        cohort: &CohortConfig<C>,
        holder: &IdentityHash,
    ) -> Result<Shard<C>> {
        if !is_identity(&delta_share.public_key) || !is_identity(&delta_public.public_key) {
            return Err(Error::InvalidArgument(
                "refresh delta would change the public key".into(),
            ));
        }
        let current = &self.public_key_shares;
        if delta_public.commitments.len() != current.commitments.len() {
            return Err(Error::InvalidArgument(
                "refresh delta has a different threshold".into(),
            ));
        }

        let shares = current
            .shares
            .iter()
            .map(|(identity, share)| {
                delta_public
                    .shares
                    .get(identity)
                    .map(|delta| (*identity, *share + delta))
                    .ok_or_else(|| Error::Missing(format!("refresh delta for {:?}", identity)))
            })
            .collect::<Result<_>>()?;
        let commitments = current
            .commitments
            .iter()
            .zip(&delta_public.commitments)
            .map(|(c, delta)| *c + delta)
            .collect();

        let refreshed = Shard {
            signing_key_share: SigningKeyShare {
                share: self.signing_key_share.share + delta_share.share,
                public_key: self.signing_key_share.public_key,
            },
            public_key_shares: PublicKeyShares {
                public_key: current.public_key,
                shares,
                commitments,
            },
        };
        refreshed.validate(cohort, holder)?;
        Ok(refreshed)
    }
}

/// Run the key refresh protocol
///
/// Every cohort member must take part. Returns the refreshed shard; the old
/// one should be discarded once all members have stored theirs.
#[instrument(skip_all, fields(session = %hex::encode(&session_id[..8]), suite = C::NAME))]
pub async fn run_key_refresh<C, A, K, R, G>(
    auth: &A,
    peers: &[K],
    cohort: &CohortConfig<C>,
    shard: &Shard<C>,
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
    info!("Starting key refresh");
    let me = auth.hash();
    shard.validate(cohort, &me)?;

    let participant = Participant::new_zero_sharing(me, cohort.clone(), session_id)?;
    let (delta_share, delta_public) = exchange(participant, auth, peers, session_id, relay, rng).await?;
    let refreshed = shard.refresh(&delta_share, &delta_public, cohort, &me)?;

    info!("Key refresh completed");
    Ok(refreshed)
}
