//! Pedersen DKG participant
//!
//! Every party deals a Feldman-verified random polynomial, proves knowledge of
//! its constant term, and ends up with the sum of all dealt polynomials
//! evaluated at its own sharing id. Two rounds of communication: one
//! broadcast plus one unicast per peer, all sent together in round 1.

use super::messages::{DkgRound1Broadcast, DkgRound1P2P};
use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Curve, Point, Scalar};
use crate::dlog;
use crate::sharing::{feldman, Feldman, Share};
use crate::types::{CohortConfig, IdentityHash, PublicKeyShares, SessionId, SharingId, SigningKeyShare};
use crate::{Error, Result};
use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
use std::collections::{BTreeMap, HashMap};
use std::mem;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroize;

/// Transcript label of the DKG proof of knowledge
pub const DKG_LABEL: &[u8] = b"FROST-PEDERSEN-DKG-V1";

const SHARING_ID_LABEL: &[u8] = b"pedersen dkg sharing id";

/// What the dealt polynomials share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    /// A fresh random secret per dealer; the output is a new key
    Secret,
    /// Zero per dealer; the output re-randomizes an existing key
    Zero,
}

enum DkgState<C: Ciphersuite> {
    Created,
    AfterRound1 {
        own_share: Share<C>,
        commitments: Vec<Point<C>>,
    },
    Complete,
    Aborted,
}

/// One cohort member running the DKG
pub struct Participant<C: Ciphersuite> {
    my_identity: IdentityHash,
    my_sharing_id: SharingId,
    cohort: CohortConfig<C>,
    session_id: SessionId,
    mode: SharingMode,
    state: DkgState<C>,
}

fn dkg_transcript(dealer: SharingId) -> Transcript {
    let mut transcript = Transcript::new(DKG_LABEL);
    transcript.append_message(SHARING_ID_LABEL, &dealer.to_be_bytes());
    transcript
}

impl<C: Ciphersuite> Participant<C> {
    /// Participant of a DKG producing a new key
    pub fn new(my_identity: IdentityHash, cohort: CohortConfig<C>, session_id: SessionId) -> Result<Self> {
        Self::with_mode(my_identity, cohort, session_id, SharingMode::Secret)
    }

    /// Participant of a DKG sharing zero, used by key refresh
    pub fn new_zero_sharing(
        my_identity: IdentityHash,
        cohort: CohortConfig<C>,
        session_id: SessionId,
    ) -> Result<Self> {
        Self::with_mode(my_identity, cohort, session_id, SharingMode::Zero)
    }

    fn with_mode(
        my_identity: IdentityHash,
        cohort: CohortConfig<C>,
        session_id: SessionId,
        mode: SharingMode,
    ) -> Result<Self> {
        cohort.validate()?;
        let my_sharing_id = cohort.require_sharing_id(&my_identity)?;
        Ok(Self {
            my_identity,
            my_sharing_id,
            cohort,
            session_id,
            mode,
            state: DkgState::Created,
        })
    }

    pub fn identity(&self) -> &IdentityHash {
        &self.my_identity
    }

    pub fn sharing_id(&self) -> SharingId {
        self.my_sharing_id
    }

    pub fn cohort(&self) -> &CohortConfig<C> {
        &self.cohort
    }

    pub fn mode(&self) -> SharingMode {
        self.mode
    }

    /// Next round to run: 1 or 2, 3 once complete, 0 after an abort
    pub fn round(&self) -> u32 {
        match self.state {
            DkgState::Created => 1,
            DkgState::AfterRound1 { .. } => 2,
            DkgState::Complete => 3,
            DkgState::Aborted => 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, DkgState::Complete)
    }

    /// Deal a polynomial: one broadcast for everyone, one share per peer
    #[instrument(skip_all, fields(sharing_id = %self.my_sharing_id))]
    pub fn round1<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<(DkgRound1Broadcast<C>, HashMap<IdentityHash, DkgRound1P2P<C>>)> {
        if !matches!(self.state, DkgState::Created) {
            return Err(Error::InvalidRound(format!(
                "DKG round 1 called while expecting round {}",
                self.round()
            )));
        }

        let mut a0 = match self.mode {
            SharingMode::Secret => Scalar::<C>::random(&mut *rng),
            SharingMode::Zero => Scalar::<C>::ZERO,
        };
        let feldman = Feldman::<C>::new(self.cohort.threshold(), self.cohort.total_parties())?;
        let (commitments, shares) = feldman.split(&a0, rng);
        let (dlog_proof, _) = dlog::prove::<C, _>(
            &Point::<C>::generator(),
            &self.session_id,
            &mut dkg_transcript(self.my_sharing_id),
            &a0,
            rng,
        );
        a0.zeroize();

        let mut outbound = HashMap::with_capacity(shares.len().saturating_sub(1));
        let mut own_share = None;
        for share in shares {
            if share.id == self.my_sharing_id {
                own_share = Some(share);
                continue;
            }
            let recipient = self
                .cohort
                .identity(share.id)
                .ok_or_else(|| Error::Failed(format!("no cohort member with sharing id {}", share.id)))?;
            outbound.insert(recipient, DkgRound1P2P { share: share.value });
        }
        let own_share = own_share.ok_or_else(|| Error::Failed("own share was not dealt".into()))?;

        self.state = DkgState::AfterRound1 {
            own_share,
            commitments: commitments.clone(),
        };
        debug!(peers = outbound.len(), "DKG round 1 complete");

        Ok((
            DkgRound1Broadcast {
                commitments,
                dlog_proof,
            },
            outbound,
        ))
    }

    /// Verify every dealer and combine the received shares
    ///
    /// Any failure leaves the participant aborted; it cannot be retried.
    #[instrument(skip_all, fields(sharing_id = %self.my_sharing_id))]
    pub fn round2(
        &mut self,
        broadcasts: &HashMap<IdentityHash, DkgRound1Broadcast<C>>,
        mut p2p: HashMap<IdentityHash, DkgRound1P2P<C>>,
    ) -> Result<(SigningKeyShare<C>, PublicKeyShares<C>)> {
        let (own_share, own_commitments) = match mem::replace(&mut self.state, DkgState::Aborted) {
            DkgState::AfterRound1 {
                own_share,
                commitments,
            } => (own_share, commitments),
            other => {
                self.state = other;
                return Err(Error::InvalidRound(format!(
                    "DKG round 2 called while expecting round {}",
                    self.round()
                )));
            }
        };

        let output = self.combine(own_share, own_commitments, broadcasts, &mut p2p)?;
        self.state = DkgState::Complete;
        info!(
            public_key = %hex::encode(crate::encoding::point_to_bytes(&output.1.public_key)),
            "DKG complete"
        );
        Ok(output)
    }

    fn combine(
        &self,
        own_share: Share<C>,
        own_commitments: Vec<Point<C>>,
        broadcasts: &HashMap<IdentityHash, DkgRound1Broadcast<C>>,
        p2p: &mut HashMap<IdentityHash, DkgRound1P2P<C>>,
    ) -> Result<(SigningKeyShare<C>, PublicKeyShares<C>)> {
        let threshold = self.cohort.threshold();
        let generator = Point::<C>::generator();

        let mut secret_share = own_share.value;
        let mut public_key = own_commitments[0];
        let mut dealt: BTreeMap<SharingId, Vec<Point<C>>> = BTreeMap::new();
        dealt.insert(self.my_sharing_id, own_commitments);

        for (dealer, dealer_identity) in self.cohort.sharing_ids() {
            if dealer == self.my_sharing_id {
                continue;
            }
            let abort = |reason: &str| {
                warn!(culprit = %dealer, reason, "DKG dealer misbehaved");
                Error::abort(dealer, reason)
            };

            let broadcast = broadcasts
                .get(&dealer_identity)
                .ok_or_else(|| Error::Missing(format!("DKG broadcast from party {}", dealer)))?;
            let received = p2p
                .remove(&dealer_identity)
                .ok_or_else(|| Error::Missing(format!("DKG share from party {}", dealer)))?;

            if broadcast.commitments.len() != threshold {
                return Err(abort("wrong number of commitments"));
            }
            let c0 = broadcast.commitments[0];
            match self.mode {
                SharingMode::Secret => {
                    if C::Curve::ID.has_cofactor() && C::Curve::has_low_order_component(&c0) {
                        return Err(abort("commitment to the secret has a low-order component"));
                    }
                    if is_identity(&c0) {
                        return Err(abort("commitment to the secret is the identity"));
                    }
                }
                SharingMode::Zero => {
                    if !is_identity(&c0) {
                        return Err(abort("zero-sharing commitment is not the identity"));
                    }
                }
            }

            dlog::verify::<C>(
                &generator,
                &c0,
                &broadcast.dlog_proof,
                &self.session_id,
                &mut dkg_transcript(dealer),
            )
            .map_err(|_| abort("invalid proof of knowledge of the secret"))?;

            let share = Share::<C>::new(self.my_sharing_id, received.share);
            feldman::verify::<C>(&share, &broadcast.commitments)
                .map_err(|_| abort("share does not match the commitments"))?;

            // Same relation as the Feldman check, recomputed with explicit powers
            let expected = expand_in_exponent::<C>(&broadcast.commitments, self.my_sharing_id);
            if scalar_base_mult::<C>(&share.value) != expected {
                return Err(Error::Failed(format!(
                    "share from party {} is inconsistent with its commitments",
                    dealer
                )));
            }

            secret_share += share.value;
            public_key += c0;
            dealt.insert(dealer, broadcast.commitments.clone());
        }

        if self.mode == SharingMode::Secret && is_identity(&public_key) {
            return Err(Error::Failed("public key is the identity".into()));
        }

        let commitments: Vec<Point<C>> = (0..threshold)
            .map(|k| dealt.values().map(|vector| vector[k]).sum())
            .collect();
        if commitments[0] != public_key {
            return Err(Error::Failed(
                "public key does not match the combined commitments".into(),
            ));
        }

        let shares = derive_public_key_shares(&self.cohort, &commitments);
        let own_public_share = shares
            .get(&self.my_identity)
            .ok_or_else(|| Error::Missing("own public key share".into()))?;
        if scalar_base_mult::<C>(&secret_share) != *own_public_share {
            return Err(Error::Failed(
                "did not calculate my public key share correctly".into(),
            ));
        }
        if self.mode == SharingMode::Secret {
            if let Some((identity, _)) = shares.iter().find(|(_, share)| is_identity(*share)) {
                return Err(Error::Failed(format!(
                    "public key share of {:?} is the identity",
                    identity
                )));
            }
        }

        Ok((
            SigningKeyShare {
                share: secret_share,
                public_key,
            },
            PublicKeyShares {
                public_key,
                shares,
                commitments,
            },
        ))
    }
}

/// `Σ_k C_k · x^k` with the powers of `x` built up front
fn expand_in_exponent<C: Ciphersuite>(commitments: &[Point<C>], id: SharingId) -> Point<C> {
    let x: Scalar<C> = id.to_scalar();
    let mut power = Scalar::<C>::ONE;
    let mut result = Point::<C>::identity();
    for commitment in commitments {
        result += *commitment * power;
        power *= x;
    }
    result
}

#[cfg(feature = "multi-thread")]
fn derive_public_key_shares<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    commitments: &[Point<C>],
) -> BTreeMap<IdentityHash, Point<C>> {
    use rayon::prelude::*;

    let members: Vec<(SharingId, IdentityHash)> = cohort.sharing_ids().collect();
    members
        .par_iter()
        .map(|(id, identity)| (*identity, feldman::evaluate_in_exponent::<C>(commitments, *id)))
        .collect()
}

#[cfg(not(feature = "multi-thread"))]
fn derive_public_key_shares<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    commitments: &[Point<C>],
) -> BTreeMap<IdentityHash, Point<C>> {
    cohort
        .sharing_ids()
        .map(|(id, identity)| (identity, feldman::evaluate_in_exponent::<C>(commitments, id)))
        .collect()
}
