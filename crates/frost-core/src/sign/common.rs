//! Signing core shared by the interactive and precomputed-nonce cosigners

use super::aggregation::{AggregationParameters, SignatureAggregator};
use super::messages::{NonceCommitment, NoncePair};
use crate::curves::{Ciphersuite, Point, Scalar};
use crate::encoding::point_to_bytes;
use crate::sharing::{Shamir, Share};
use crate::types::{CohortConfig, IdentityHash, PartialSignature, Shard, SharingId, Signature};
use crate::{Error, Result};
use elliptic_curve::group::Group;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use zeroize::Zeroize;

pub(crate) fn check_message(message: &[u8]) -> Result<()> {
    if message.is_empty() {
        return Err(Error::InvalidArgument("message is empty".into()));
    }
    Ok(())
}

/// Session members as `(sharing id, identity)`, ordered by sharing id
///
/// A session is exactly `t` distinct cohort members.
pub(crate) fn session_members<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    participants: &[IdentityHash],
) -> Result<Vec<(SharingId, IdentityHash)>> {
    if participants.len() != cohort.threshold() {
        return Err(Error::InvalidArgument(format!(
            "a signing session needs exactly {} participants, got {}",
            cohort.threshold(),
            participants.len()
        )));
    }
    let mut members = participants
        .iter()
        .map(|identity| cohort.require_sharing_id(identity).map(|id| (id, *identity)))
        .collect::<Result<Vec<_>>>()?;
    members.sort();
    if members.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(Error::InvalidArgument("duplicate session participant".into()));
    }
    Ok(members)
}

/// Group commitment `R` and its per-party parts
pub(crate) struct Binding<C: Ciphersuite> {
    pub r: Point<C>,
    pub r_js: BTreeMap<IdentityHash, Point<C>>,
    pub factors: BTreeMap<IdentityHash, Scalar<C>>,
}

/// Binding factors `r_j = H(j, m, D_1..D_t || E_1..E_t)` and `R = Σ D_j + r_j·E_j`
pub(crate) fn bind<C: Ciphersuite>(
    members: &[(SharingId, IdentityHash)],
    commitments: &BTreeMap<IdentityHash, NonceCommitment<C>>,
    message: &[u8],
) -> Result<Binding<C>> {
    let mut ordered = Vec::with_capacity(members.len());
    for (id, identity) in members {
        let commitment = commitments
            .get(identity)
            .ok_or_else(|| Error::Missing(format!("nonce commitment of party {}", id)))?;
        commitment.check(*id)?;
        ordered.push((*id, *identity, commitment));
    }

    let mut concat = Vec::new();
    for (_, _, commitment) in &ordered {
        concat.extend_from_slice(&point_to_bytes(&commitment.d));
    }
    for (_, _, commitment) in &ordered {
        concat.extend_from_slice(&point_to_bytes(&commitment.e));
    }

    let mut r = Point::<C>::identity();
    let mut r_js = BTreeMap::new();
    let mut factors = BTreeMap::new();
    for (id, identity, commitment) in ordered {
        let factor = C::hash_to_scalar(&[&id.to_be_bytes(), message, &concat]);
        let r_j = commitment.d + commitment.e * factor;
        r += r_j;
        r_js.insert(identity, r_j);
        factors.insert(identity, factor);
    }
    Ok(Binding { r, r_js, factors })
}

/// What an aggregating cosigner keeps between its partial signature and aggregation
#[derive(Debug, Clone)]
pub(crate) struct Stash<C: Ciphersuite> {
    pub message: Vec<u8>,
    pub partial: PartialSignature<C>,
    pub parameters: AggregationParameters<C>,
}

/// Long-lived inputs of one cosigner in one signing session
#[derive(Debug, Clone)]
pub(crate) struct CosignerContext<C: Ciphersuite> {
    pub my_identity: IdentityHash,
    pub my_sharing_id: SharingId,
    pub cohort: CohortConfig<C>,
    pub shard: Shard<C>,
    pub members: Vec<(SharingId, IdentityHash)>,
}

impl<C: Ciphersuite> CosignerContext<C> {
    pub fn new(
        my_identity: IdentityHash,
        cohort: CohortConfig<C>,
        shard: Shard<C>,
        session_participants: &[IdentityHash],
    ) -> Result<Self> {
        cohort.validate()?;
        let my_sharing_id = cohort.require_sharing_id(&my_identity)?;
        shard.validate(&cohort, &my_identity)?;
        let members = session_members(&cohort, session_participants)?;
        if !members.iter().any(|(id, _)| *id == my_sharing_id) {
            return Err(Error::InvalidArgument(
                "this party is not a session participant".into(),
            ));
        }
        Ok(Self {
            my_identity,
            my_sharing_id,
            cohort,
            shard,
            members,
        })
    }

    pub fn is_aggregator(&self) -> bool {
        self.cohort.is_signature_aggregator(&self.my_identity)
    }

    pub fn member_identities(&self) -> Vec<IdentityHash> {
        self.members.iter().map(|(_, identity)| *identity).collect()
    }

    /// `z = d + e·r_self + λ_self·x_self·c`; consumes the nonces
    pub fn sign(
        &self,
        nonces: NoncePair<C>,
        commitments: &BTreeMap<IdentityHash, NonceCommitment<C>>,
        message: &[u8],
    ) -> Result<(PartialSignature<C>, AggregationParameters<C>)> {
        check_message(message)?;
        let own = commitments
            .get(&self.my_identity)
            .ok_or_else(|| Error::Missing("own nonce commitment".into()))?;
        if *own != nonces.commitment() {
            return Err(Error::Failed(
                "own nonce commitment does not match the nonces".into(),
            ));
        }

        let binding = bind::<C>(&self.members, commitments, message)?;
        let factor = binding
            .factors
            .get(&self.my_identity)
            .ok_or_else(|| Error::Missing("own binding factor".into()))?;
        let c = C::challenge(&binding.r, self.shard.public_key(), message);

        let present: Vec<SharingId> = self.members.iter().map(|(id, _)| *id).collect();
        let shamir = Shamir::<C>::new(self.cohort.threshold(), self.cohort.total_parties())?;
        let mut additive = shamir.to_additive(
            &Share::new(self.my_sharing_id, self.shard.signing_key_share.share),
            &present,
        )?;
        let z = nonces.d + nonces.e * factor + additive * c;
        additive.zeroize();
        drop(nonces);

        debug!(sharing_id = %self.my_sharing_id, "partial signature produced");
        let parameters = AggregationParameters {
            commitments: self
                .members
                .iter()
                .filter_map(|(_, identity)| {
                    commitments
                        .get(identity)
                        .map(|commitment| (*identity, *commitment))
                })
                .collect(),
            r: Some(binding.r),
            r_js: Some(binding.r_js),
        };
        Ok((PartialSignature { z }, parameters))
    }

    /// Aggregate with the cosigner's own stashed partial taking precedence
    pub fn aggregate(
        &self,
        stash: &Stash<C>,
        message: &[u8],
        partials: &HashMap<IdentityHash, PartialSignature<C>>,
    ) -> Result<Signature<C>> {
        if message != stash.message.as_slice() {
            return Err(Error::InvalidArgument(
                "message differs from the one partially signed".into(),
            ));
        }
        let mut all = partials.clone();
        all.insert(self.my_identity, stash.partial);

        SignatureAggregator::new(
            &self.my_identity,
            &self.cohort,
            *self.shard.public_key(),
            Some(&self.shard.public_key_shares),
            &self.member_identities(),
            message,
            stash.parameters.clone(),
        )?
        .aggregate(&all)
    }
}
