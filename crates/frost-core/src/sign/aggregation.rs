//! Signature aggregation with identifiable abort
//!
//! An aggregator sums the partial signatures of a session. With the cohort's
//! public key shares at hand it first checks every partial on its own,
//! `g^{z_j} = R_j + (c·λ_j)·Y_j`, so a bad contribution is pinned on the party
//! that sent it instead of only failing the final verification.

use super::common::{bind, check_message, session_members};
use super::messages::NonceCommitment;
use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Point, Scalar};
use crate::encoding::point_to_bytes;
use crate::sharing::Shamir;
use crate::types::{CohortConfig, IdentityHash, PartialSignature, PublicKeyShares, SharingId, Signature};
use crate::{Error, Result};
use elliptic_curve::ff::Field;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Everything about a session's nonces an aggregator needs
#[derive(Debug, Clone)]
pub struct AggregationParameters<C: Ciphersuite> {
    /// `(D_j, E_j)` of every session participant
    pub commitments: BTreeMap<IdentityHash, NonceCommitment<C>>,
    /// Group commitment, if already computed
    pub r: Option<Point<C>>,
    /// Per-party `R_j`, if already computed
    pub r_js: Option<BTreeMap<IdentityHash, Point<C>>>,
}

impl<C: Ciphersuite> AggregationParameters<C> {
    /// Parameters from the nonce commitments alone; `R` is recomputed on use
    pub fn from_commitments(commitments: BTreeMap<IdentityHash, NonceCommitment<C>>) -> Self {
        Self {
            commitments,
            r: None,
            r_js: None,
        }
    }
}

/// Combines partial signatures of one session into a [`Signature`]
pub struct SignatureAggregator<'a, C: Ciphersuite> {
    cohort: &'a CohortConfig<C>,
    public_key: Point<C>,
    public_key_shares: Option<&'a PublicKeyShares<C>>,
    members: Vec<(SharingId, IdentityHash)>,
    message: &'a [u8],
    parameters: AggregationParameters<C>,
}

impl<'a, C: Ciphersuite> SignatureAggregator<'a, C> {
    /// `my_identity` must be a designated signature aggregator of the cohort
    pub fn new(
        my_identity: &IdentityHash,
        cohort: &'a CohortConfig<C>,
        public_key: Point<C>,
        public_key_shares: Option<&'a PublicKeyShares<C>>,
        session_participants: &[IdentityHash],
        message: &'a [u8],
        parameters: AggregationParameters<C>,
    ) -> Result<Self> {
        if !cohort.is_signature_aggregator(my_identity) {
            return Err(Error::InvalidArgument(
                "this party is not a signature aggregator".into(),
            ));
        }
        check_message(message)?;
        if is_identity(&public_key) {
            return Err(Error::InvalidArgument("public key is the identity".into()));
        }
        if let Some(shares) = public_key_shares {
            if shares.public_key != public_key {
                return Err(Error::InvalidArgument(
                    "public key shares belong to another key".into(),
                ));
            }
        }
        let members = session_members(cohort, session_participants)?;
        for (id, identity) in &members {
            if !parameters.commitments.contains_key(identity) {
                return Err(Error::Missing(format!("nonce commitment of party {}", id)));
            }
        }

        Ok(Self {
            cohort,
            public_key,
            public_key_shares,
            members,
            message,
            parameters,
        })
    }

    /// Whether bad partial signatures can be attributed
    pub fn has_identifiable_abort(&self) -> bool {
        self.public_key_shares.is_some()
    }

    /// Check and sum one partial signature per session participant
    pub fn aggregate(self, partials: &HashMap<IdentityHash, PartialSignature<C>>) -> Result<Signature<C>> {
        let needs_openings = self.has_identifiable_abort();
        let (r, r_js) = match (self.parameters.r, self.parameters.r_js.clone()) {
            (Some(r), Some(r_js)) => (r, r_js),
            (Some(r), None) if !needs_openings => (r, BTreeMap::new()),
            _ => {
                let binding = bind::<C>(&self.members, &self.parameters.commitments, self.message)?;
                (binding.r, binding.r_js)
            }
        };

        let mut contributions = Vec::with_capacity(self.members.len());
        for (id, identity) in &self.members {
            let partial = partials
                .get(identity)
                .ok_or_else(|| Error::Missing(format!("partial signature of party {}", id)))?;
            contributions.push((*id, *identity, partial.z));
        }

        if let Some(shares) = self.public_key_shares {
            let c = C::challenge(&r, &self.public_key, self.message);
            let ids: Vec<SharingId> = self.members.iter().map(|(id, _)| *id).collect();
            let lambdas = Shamir::<C>::new(self.cohort.threshold(), self.cohort.total_parties())?
                .lagrange_coefficients(&ids)?;

            for (id, identity, z_j) in &contributions {
                let y_j = shares
                    .share_of(identity)
                    .ok_or_else(|| Error::Missing(format!("public key share of party {}", id)))?;
                let r_j = r_js
                    .get(identity)
                    .ok_or_else(|| Error::Missing(format!("nonce commitment of party {}", id)))?;
                let lambda = lambdas
                    .get(id)
                    .ok_or_else(|| Error::Failed(format!("no Lagrange coefficient for party {}", id)))?;
                if scalar_base_mult::<C>(z_j) != *r_j + *y_j * (c * lambda) {
                    warn!(culprit = %id, "partial signature does not verify");
                    return Err(Error::abort(*id, "partial signature does not verify"));
                }
            }
        }

        let z = contributions
            .iter()
            .fold(Scalar::<C>::ZERO, |acc, (_, _, z_j)| acc + z_j);
        let signature = Signature { r, z };
        signature
            .verify(&self.public_key, self.message)
            .map_err(|_| Error::Failed("aggregated signature does not verify".into()))?;

        info!(
            public_key = %hex::encode(point_to_bytes(&self.public_key)),
            signers = self.members.len(),
            "signature aggregated"
        );
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{Ed25519Sha512, P256Sha256, Secp256k1Sha256};
    use crate::sign::InteractiveCosigner;
    use crate::test_utils::{cohort_of, identities, shards};
    use crate::types::Shard;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    struct Session<C: Ciphersuite> {
        cohort: CohortConfig<C>,
        shards: Vec<Shard<C>>,
        members: Vec<IdentityHash>,
        commitments: BTreeMap<IdentityHash, NonceCommitment<C>>,
        partials: HashMap<IdentityHash, PartialSignature<C>>,
    }

    /// Cosigners 1 and 3 of a 2-of-3 cohort sign; nobody aggregates yet
    fn partially_signed<C: Ciphersuite>(seed: u64, message: &[u8]) -> Session<C> {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = identities(3, &mut rng);
        let cohort = cohort_of::<C>(2, &keys);
        let shards = shards(&cohort, [1u8; 32], &mut rng);
        let members = vec![cohort.participants()[0], cohort.participants()[2]];

        let mut cosigners: Vec<InteractiveCosigner<C>> = [0usize, 2]
            .iter()
            .map(|&i| {
                InteractiveCosigner::new(cohort.participants()[i], cohort.clone(), shards[i].clone(), &members)
                    .unwrap()
            })
            .collect();
        let commitments: BTreeMap<IdentityHash, NonceCommitment<C>> = cosigners
            .iter_mut()
            .zip(&members)
            .map(|(cosigner, identity)| (*identity, cosigner.round1(&mut rng).unwrap()))
            .collect();
        let partials = cosigners
            .iter_mut()
            .zip(&members)
            .map(|(cosigner, identity)| {
                let received = commitments
                    .iter()
                    .filter(|(sender, _)| *sender != identity)
                    .map(|(sender, c)| (*sender, *c))
                    .collect();
                (*identity, cosigner.round2(&received, message).unwrap())
            })
            .collect();

        Session {
            cohort,
            shards,
            members,
            commitments,
            partials,
        }
    }

    fn standalone_aggregator<C: Ciphersuite>(seed: u64) {
        let message = b"standalone".as_slice();
        let session = partially_signed::<C>(seed, message);
        // Party 2 did not cosign but is a designated aggregator
        let outsider = session.cohort.participants()[1];
        let public_key = *session.shards[1].public_key();

        let with_shares = SignatureAggregator::new(
            &outsider,
            &session.cohort,
            public_key,
            Some(&session.shards[1].public_key_shares),
            &session.members,
            message,
            AggregationParameters::from_commitments(session.commitments.clone()),
        )
        .unwrap();
        assert!(with_shares.has_identifiable_abort());
        let signature = with_shares.aggregate(&session.partials).unwrap();
        signature.verify(&public_key, message).unwrap();

        let without_shares = SignatureAggregator::new(
            &outsider,
            &session.cohort,
            public_key,
            None,
            &session.members,
            message,
            AggregationParameters::from_commitments(session.commitments.clone()),
        )
        .unwrap();
        assert_eq!(without_shares.aggregate(&session.partials).unwrap(), signature);
    }

    #[test]
    fn test_standalone_aggregator_ed25519() {
        standalone_aggregator::<Ed25519Sha512>(500);
    }

    #[test]
    fn test_standalone_aggregator_secp256k1() {
        standalone_aggregator::<Secp256k1Sha256>(501);
    }

    #[test]
    fn test_standalone_aggregator_p256() {
        standalone_aggregator::<P256Sha256>(502);
    }

    #[test]
    fn test_bad_partial_without_shares_is_not_attributed() {
        let message = b"no shares".as_slice();
        let mut session = partially_signed::<Secp256k1Sha256>(503, message);
        let victim = session.members[1];
        session.partials.insert(victim, PartialSignature { z: k256::Scalar::ONE });

        let aggregator = SignatureAggregator::new(
            &session.cohort.participants()[1],
            &session.cohort,
            *session.shards[0].public_key(),
            None,
            &session.members,
            message,
            AggregationParameters::from_commitments(session.commitments.clone()),
        )
        .unwrap();
        let err = aggregator.aggregate(&session.partials).unwrap_err();
        assert!(matches!(err, Error::Failed(_)));
    }

    #[test]
    fn test_aggregator_preconditions() {
        let message = b"preconditions".as_slice();
        let session = partially_signed::<P256Sha256>(504, message);
        let public_key = *session.shards[0].public_key();
        let params = || AggregationParameters::from_commitments(session.commitments.clone());
        let me = session.cohort.participants()[0];

        let stranger = IdentityHash::new([0xab; 32]);
        assert!(SignatureAggregator::new(&stranger, &session.cohort, public_key, None, &session.members, message, params()).is_err());
        assert!(SignatureAggregator::new(&me, &session.cohort, public_key, None, &session.members, b"", params()).is_err());
        assert!(SignatureAggregator::new(&me, &session.cohort, public_key, None, &session.members[..1], message, params()).is_err());

        let mut missing = params();
        missing.commitments.remove(&session.members[0]);
        assert!(matches!(
            SignatureAggregator::new(&me, &session.cohort, public_key, None, &session.members, message, missing),
            Err(Error::Missing(_))
        ));

        let mut partials = session.partials.clone();
        partials.remove(&session.members[1]);
        let aggregator = SignatureAggregator::new(&me, &session.cohort, public_key, None, &session.members, message, params()).unwrap();
        assert!(matches!(aggregator.aggregate(&partials), Err(Error::Missing(_))));
    }
}
