//! FROST with precomputed nonces
//!
//! A preprocessing protocol run by the whole cohort produces a batch of nonce
//! commitments for every member. Later, any `t` members sign in a single
//! round by each consuming the same batch index. Consuming an index twice
//! would reuse a nonce and leak the signing key share, so private nonces are
//! handed out by [`PrivateNoncePairs::take`], which never returns an index
//! twice and destroys every index it skips.

use super::common::{check_message, CosignerContext, Stash};
use super::messages::{NonceCommitment, NoncePair};
use crate::curves::Ciphersuite;
use crate::types::{CohortConfig, IdentityHash, PartialSignature, Shard, SharingId, Signature};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::mem;
use tracing::{debug, info, warn};

/// Preprocessing broadcast: `τ` nonce commitments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PreGenRound1Broadcast<C: Ciphersuite> {
    pub commitments: Vec<NonceCommitment<C>>,
}

/// Every cohort member's nonce commitment for one batch index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PreSignature<C: Ciphersuite> {
    pub commitments: BTreeMap<IdentityHash, NonceCommitment<C>>,
}

/// Public output of preprocessing, identical at every member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PreSignatureBatch<C: Ciphersuite> {
    presignatures: Vec<PreSignature<C>>,
}

impl<C: Ciphersuite> PreSignatureBatch<C> {
    pub fn len(&self) -> usize {
        self.presignatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presignatures.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&PreSignature<C>> {
        self.presignatures.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "presignature index {} out of range 0..{}",
                index,
                self.presignatures.len()
            ))
        })
    }
}

/// A member's secret nonces for a batch; each index can be taken once
pub struct PrivateNoncePairs<C: Ciphersuite> {
    pairs: Vec<Option<NoncePair<C>>>,
    next: usize,
}

impl<C: Ciphersuite> PrivateNoncePairs<C> {
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Indices that can still be taken
    pub fn remaining(&self) -> usize {
        self.pairs.len().saturating_sub(self.next)
    }

    /// Lowest index that can still be taken
    pub fn next_index(&self) -> Option<usize> {
        (self.next < self.pairs.len()).then_some(self.next)
    }

    /// Move out the pair at `index`; every lower index is destroyed
    pub fn take(&mut self, index: usize) -> Result<NoncePair<C>> {
        if index >= self.pairs.len() {
            return Err(Error::InvalidArgument(format!(
                "nonce index {} out of range 0..{}",
                index,
                self.pairs.len()
            )));
        }
        if index < self.next {
            warn!(index, "refusing to reuse a nonce pair");
            return Err(Error::NonceReuse(index));
        }
        for skipped in &mut self.pairs[self.next..index] {
            skipped.take();
        }
        self.next = index + 1;
        self.pairs[index].take().ok_or(Error::NonceReuse(index))
    }
}

impl<C: Ciphersuite> fmt::Debug for PrivateNoncePairs<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateNoncePairs")
            .field("len", &self.pairs.len())
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

enum PreGenState<C: Ciphersuite> {
    Created,
    Committed {
        nonces: Vec<NoncePair<C>>,
        commitments: Vec<NonceCommitment<C>>,
    },
    Complete,
    Aborted,
}

/// One cohort member in nonce preprocessing
pub struct PreGenParticipant<C: Ciphersuite> {
    my_identity: IdentityHash,
    cohort: CohortConfig<C>,
    tau: usize,
    state: PreGenState<C>,
}

impl<C: Ciphersuite> PreGenParticipant<C> {
    /// Prepare `tau` presignatures
    pub fn new(my_identity: IdentityHash, cohort: CohortConfig<C>, tau: usize) -> Result<Self> {
        cohort.validate()?;
        cohort.require_sharing_id(&my_identity)?;
        if tau == 0 {
            return Err(Error::InvalidArgument("at least one presignature is required".into()));
        }
        Ok(Self {
            my_identity,
            cohort,
            tau,
            state: PreGenState::Created,
        })
    }

    pub fn round(&self) -> u32 {
        match self.state {
            PreGenState::Created => 1,
            PreGenState::Committed { .. } => 2,
            PreGenState::Complete => 3,
            PreGenState::Aborted => 0,
        }
    }

    pub fn round1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<PreGenRound1Broadcast<C>> {
        if !matches!(self.state, PreGenState::Created) {
            return Err(Error::InvalidRound(format!(
                "preprocessing round 1 called while expecting round {}",
                self.round()
            )));
        }
        let nonces: Vec<NoncePair<C>> = (0..self.tau).map(|_| NoncePair::random(&mut *rng)).collect();
        let commitments: Vec<NonceCommitment<C>> = nonces.iter().map(NoncePair::commitment).collect();
        self.state = PreGenState::Committed {
            nonces,
            commitments: commitments.clone(),
        };
        Ok(PreGenRound1Broadcast { commitments })
    }

    /// Check every member's commitments and assemble the batch
    pub fn round2(
        &mut self,
        received: &HashMap<IdentityHash, PreGenRound1Broadcast<C>>,
    ) -> Result<(PreSignatureBatch<C>, PrivateNoncePairs<C>)> {
        let (nonces, own) = match mem::replace(&mut self.state, PreGenState::Aborted) {
            PreGenState::Committed {
                nonces,
                commitments,
            } => (nonces, commitments),
            other => {
                self.state = other;
                return Err(Error::InvalidRound(format!(
                    "preprocessing round 2 called while expecting round {}",
                    self.round()
                )));
            }
        };

        let mut presignatures: Vec<PreSignature<C>> = (0..self.tau)
            .map(|_| PreSignature {
                commitments: BTreeMap::new(),
            })
            .collect();
        for (id, identity) in self.cohort.sharing_ids() {
            let commitments = if identity == self.my_identity {
                &own
            } else {
                &received
                    .get(&identity)
                    .ok_or_else(|| Error::Missing(format!("preprocessing broadcast from party {}", id)))?
                    .commitments
            };
            if commitments.len() != self.tau {
                warn!(culprit = %id, "wrong number of presignature commitments");
                return Err(Error::abort(id, "wrong number of presignature commitments"));
            }
            for (presignature, commitment) in presignatures.iter_mut().zip(commitments) {
                commitment.check(id)?;
                presignature.commitments.insert(identity, *commitment);
            }
        }

        self.state = PreGenState::Complete;
        debug!(tau = self.tau, "preprocessing complete");
        Ok((
            PreSignatureBatch { presignatures },
            PrivateNoncePairs {
                pairs: nonces.into_iter().map(Some).collect(),
                next: 0,
            },
        ))
    }
}

enum CosignerState<C: Ciphersuite> {
    Ready {
        nonces: NoncePair<C>,
        commitments: BTreeMap<IdentityHash, NonceCommitment<C>>,
    },
    PartiallySigned(Stash<C>),
    Done,
    Aborted,
}

/// A session participant signing with one precomputed presignature
pub struct NonInteractiveCosigner<C: Ciphersuite> {
    context: CosignerContext<C>,
    index: usize,
    state: CosignerState<C>,
}

impl<C: Ciphersuite> NonInteractiveCosigner<C> {
    /// Bind a cosigner to presignature `index`, consuming its private nonces
    ///
    /// All members of the session must use the same index.
    pub fn new(
        my_identity: IdentityHash,
        cohort: CohortConfig<C>,
        shard: Shard<C>,
        session_participants: &[IdentityHash],
        batch: &PreSignatureBatch<C>,
        index: usize,
        nonces: &mut PrivateNoncePairs<C>,
    ) -> Result<Self> {
        let context = CosignerContext::new(my_identity, cohort, shard, session_participants)?;
        let presignature = batch.get(index)?;
        let commitments = context
            .members
            .iter()
            .map(|(id, identity)| {
                presignature
                    .commitments
                    .get(identity)
                    .map(|commitment| (*identity, *commitment))
                    .ok_or_else(|| Error::Missing(format!("presignature commitment of party {}", id)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let pair = nonces.take(index)?;
        if commitments.get(&my_identity) != Some(&pair.commitment()) {
            return Err(Error::Failed(
                "private nonces do not open this party's presignature commitment".into(),
            ));
        }

        Ok(Self {
            context,
            index,
            state: CosignerState::Ready {
                nonces: pair,
                commitments,
            },
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sharing_id(&self) -> SharingId {
        self.context.my_sharing_id
    }

    pub fn is_signature_aggregator(&self) -> bool {
        self.context.is_aggregator()
    }

    pub fn round(&self) -> u32 {
        match self.state {
            CosignerState::Ready { .. } => 1,
            CosignerState::PartiallySigned(_) => 2,
            CosignerState::Done => 3,
            CosignerState::Aborted => 0,
        }
    }

    /// Sign `message` with the bound presignature; the nonces are destroyed
    pub fn produce_partial_signature(&mut self, message: &[u8]) -> Result<PartialSignature<C>> {
        if !matches!(self.state, CosignerState::Ready { .. }) {
            return Err(Error::InvalidRound(format!(
                "partial signature requested while expecting round {}",
                self.round()
            )));
        }
        check_message(message)?;

        let (nonces, commitments) = match mem::replace(&mut self.state, CosignerState::Aborted) {
            CosignerState::Ready { nonces, commitments } => (nonces, commitments),
            other => {
                self.state = other;
                return Err(Error::InvalidRound("presignature already used".into()));
            }
        };

        let (partial, parameters) = self.context.sign(nonces, &commitments, message)?;
        self.state = if self.context.is_aggregator() {
            CosignerState::PartiallySigned(Stash {
                message: message.to_vec(),
                partial,
                parameters,
            })
        } else {
            CosignerState::Done
        };
        Ok(partial)
    }

    /// Combine the session's partial signatures; aggregators only
    pub fn aggregate(
        &mut self,
        message: &[u8],
        partials: &HashMap<IdentityHash, PartialSignature<C>>,
    ) -> Result<Signature<C>> {
        if !self.context.is_aggregator() {
            return Err(Error::InvalidArgument(
                "this party is not a signature aggregator".into(),
            ));
        }
        let stash = match &self.state {
            CosignerState::PartiallySigned(stash) => stash,
            _ => {
                return Err(Error::InvalidRound(format!(
                    "aggregation called while expecting round {}",
                    self.round()
                )))
            }
        };
        let signature = self.context.aggregate(stash, message, partials)?;
        self.state = CosignerState::Done;
        info!(index = self.index, "presigned signature aggregated");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{Ed25519Sha512, P256Sha256, Secp256k1Sha256};
    use crate::test_utils::{cohort_of, identities, pregen, shards};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn presigned_signing<C: Ciphersuite>(seed: u64) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let keys = identities(4, &mut rng);
        let cohort = cohort_of::<C>(3, &keys);
        let shards = shards(&cohort, [1u8; 32], &mut rng);
        let (batches, mut nonces) = pregen(&cohort, 3, &mut rng).unwrap();
        for batch in &batches {
            assert_eq!(batch, &batches[0]);
        }

        // Different subsets sign different messages with successive indices
        for (index, signers) in [[0usize, 1, 2], [1, 2, 3], [0, 2, 3]].iter().enumerate() {
            let members: Vec<IdentityHash> = signers.iter().map(|&i| cohort.participants()[i]).collect();
            let message = format!("presigned message {}", index).into_bytes();

            let mut cosigners: Vec<NonInteractiveCosigner<C>> = signers
                .iter()
                .map(|&i| {
                    NonInteractiveCosigner::new(
                        cohort.participants()[i],
                        cohort.clone(),
                        shards[i].clone(),
                        &members,
                        &batches[i],
                        index,
                        &mut nonces[i],
                    )
                    .unwrap()
                })
                .collect();
            let partials: HashMap<IdentityHash, PartialSignature<C>> = cosigners
                .iter_mut()
                .zip(&members)
                .map(|(cosigner, identity)| (*identity, cosigner.produce_partial_signature(&message).unwrap()))
                .collect();

            let signatures: Vec<Signature<C>> = cosigners
                .iter_mut()
                .map(|cosigner| cosigner.aggregate(&message, &partials).unwrap())
                .collect();
            for signature in &signatures {
                assert_eq!(signature, &signatures[0]);
            }
            signatures[0].verify(shards[0].public_key(), &message).unwrap();
        }
    }

    #[test]
    fn test_presigned_ed25519() {
        presigned_signing::<Ed25519Sha512>(700);
    }

    #[test]
    fn test_presigned_secp256k1() {
        presigned_signing::<Secp256k1Sha256>(701);
    }

    #[test]
    fn test_presigned_p256() {
        presigned_signing::<P256Sha256>(702);
    }

    #[test]
    fn test_nonce_pairs_are_consume_once() {
        let mut rng = ChaCha20Rng::seed_from_u64(710);
        let keys = identities(3, &mut rng);
        let cohort = cohort_of::<Secp256k1Sha256>(2, &keys);
        let (_, mut nonces) = pregen(&cohort, 4, &mut rng).unwrap();
        let pairs = &mut nonces[0];

        assert_eq!(pairs.next_index(), Some(0));
        pairs.take(0).unwrap();
        assert!(matches!(pairs.take(0), Err(Error::NonceReuse(0))));

        // Jumping ahead destroys the skipped index
        pairs.take(2).unwrap();
        assert!(matches!(pairs.take(1), Err(Error::NonceReuse(1))));
        assert_eq!(pairs.remaining(), 1);
        assert!(matches!(pairs.take(9), Err(Error::InvalidArgument(_))));
        pairs.take(3).unwrap();
        assert_eq!(pairs.next_index(), None);
    }

    #[test]
    fn test_reused_index_is_refused_by_cosigner() {
        let mut rng = ChaCha20Rng::seed_from_u64(711);
        let keys = identities(3, &mut rng);
        let cohort = cohort_of::<Ed25519Sha512>(2, &keys);
        let shards = shards(&cohort, [1u8; 32], &mut rng);
        let (batches, mut nonces) = pregen(&cohort, 2, &mut rng).unwrap();
        let members = vec![cohort.participants()[0], cohort.participants()[1]];

        let make = |nonces: &mut PrivateNoncePairs<Ed25519Sha512>| {
            NonInteractiveCosigner::new(members[0], cohort.clone(), shards[0].clone(), &members, &batches[0], 0, nonces)
        };
        let mut first = make(&mut nonces[0]).unwrap();
        first.produce_partial_signature(b"first").unwrap();
        assert!(matches!(
            first.produce_partial_signature(b"second"),
            Err(Error::InvalidRound(_))
        ));
        assert!(matches!(make(&mut nonces[0]), Err(Error::NonceReuse(0))));
    }

    #[test]
    fn test_wrong_nonces_are_detected() {
        let mut rng = ChaCha20Rng::seed_from_u64(712);
        let keys = identities(3, &mut rng);
        let cohort = cohort_of::<P256Sha256>(2, &keys);
        let shards = shards(&cohort, [1u8; 32], &mut rng);
        let (batches, mut nonces) = pregen(&cohort, 1, &mut rng).unwrap();
        let members = vec![cohort.participants()[0], cohort.participants()[1]];

        // Party 1 presents party 2's private nonces
        let result = NonInteractiveCosigner::new(
            members[0],
            cohort.clone(),
            shards[0].clone(),
            &members,
            &batches[0],
            0,
            &mut nonces[1],
        );
        assert!(matches!(result, Err(Error::Failed(_))));
    }

    #[test]
    fn test_empty_message_rejected_presigned() {
        let mut rng = ChaCha20Rng::seed_from_u64(713);
        let keys = identities(2, &mut rng);
        let cohort = cohort_of::<Secp256k1Sha256>(2, &keys);
        let shards = shards(&cohort, [1u8; 32], &mut rng);
        let (batches, mut nonces) = pregen(&cohort, 1, &mut rng).unwrap();
        let members = cohort.participants().to_vec();

        let mut cosigner = NonInteractiveCosigner::new(
            members[0],
            cohort.clone(),
            shards[0].clone(),
            &members,
            &batches[0],
            0,
            &mut nonces[0],
        )
        .unwrap();
        assert!(matches!(
            cosigner.produce_partial_signature(b""),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(cosigner.round(), 1);
    }

    #[test]
    fn test_pregen_blames_short_batch() {
        let mut rng = ChaCha20Rng::seed_from_u64(714);
        let keys = identities(3, &mut rng);
        let cohort = cohort_of::<Ed25519Sha512>(2, &keys);
        let mut participants: Vec<PreGenParticipant<Ed25519Sha512>> = cohort
            .participants()
            .iter()
            .map(|id| PreGenParticipant::new(*id, cohort.clone(), 2).unwrap())
            .collect();
        let mut broadcasts: HashMap<IdentityHash, PreGenRound1Broadcast<Ed25519Sha512>> = participants
            .iter_mut()
            .zip(cohort.participants())
            .map(|(p, id)| (*id, p.round1(&mut rng).unwrap()))
            .collect();
        if let Some(broadcast) = broadcasts.get_mut(&cohort.participants()[2]) {
            broadcast.commitments.pop();
        }

        let err = participants[0].round2(&broadcasts).unwrap_err();
        assert_eq!(err.culprit(), Some(SharingId::new(3).unwrap()));
        assert!(matches!(participants[1].round1(&mut rng), Err(Error::InvalidRound(_))));
        assert!(PreGenParticipant::new(cohort.participants()[0], cohort.clone(), 0).is_err());
    }

    #[test]
    fn test_pregen_round2_before_round1_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(715);
        let keys = identities(2, &mut rng);
        let cohort = cohort_of::<P256Sha256>(2, &keys);
        let mut participants: Vec<PreGenParticipant<P256Sha256>> = cohort
            .participants()
            .iter()
            .map(|id| PreGenParticipant::new(*id, cohort.clone(), 3).unwrap())
            .collect();

        let err = participants[0].round2(&HashMap::new()).err().unwrap();
        assert!(matches!(err, Error::InvalidRound(_)));
        assert_eq!(participants[0].round(), 1);

        let broadcasts: HashMap<IdentityHash, PreGenRound1Broadcast<P256Sha256>> = participants
            .iter_mut()
            .zip(cohort.participants())
            .map(|(p, id)| (*id, p.round1(&mut rng).unwrap()))
            .collect();
        let (batch, nonces) = participants[0].round2(&broadcasts).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(nonces.remaining(), 3);
        assert_eq!(participants[0].round(), 3);
        assert!(matches!(participants[0].round2(&broadcasts), Err(Error::InvalidRound(_))));
    }
}
