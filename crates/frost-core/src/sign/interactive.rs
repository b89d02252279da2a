//! Interactive FROST cosigner: nonce commitment, partial signature, aggregation

use super::common::{check_message, CosignerContext, Stash};
use super::messages::{NonceCommitment, NoncePair, SignRound1Broadcast};
use crate::curves::Ciphersuite;
use crate::types::{CohortConfig, IdentityHash, PartialSignature, Shard, SharingId, Signature};
use crate::{Error, Result};
use rand_core::{CryptoRng, RngCore};
use std::collections::{BTreeMap, HashMap};
use std::mem;
use tracing::{debug, instrument};

enum CosignerState<C: Ciphersuite> {
    Created,
    NonceCommitted {
        nonces: NoncePair<C>,
        commitment: NonceCommitment<C>,
    },
    PartiallySigned(Stash<C>),
    Done,
    Aborted,
}

/// One session participant in a three-round FROST signing
pub struct InteractiveCosigner<C: Ciphersuite> {
    context: CosignerContext<C>,
    state: CosignerState<C>,
}

impl<C: Ciphersuite> InteractiveCosigner<C> {
    /// `session_participants` are the `t` cohort members signing together
    pub fn new(
        my_identity: IdentityHash,
        cohort: CohortConfig<C>,
        shard: Shard<C>,
        session_participants: &[IdentityHash],
    ) -> Result<Self> {
        Ok(Self {
            context: CosignerContext::new(my_identity, cohort, shard, session_participants)?,
            state: CosignerState::Created,
        })
    }

    pub fn sharing_id(&self) -> SharingId {
        self.context.my_sharing_id
    }

    pub fn is_signature_aggregator(&self) -> bool {
        self.context.is_aggregator()
    }

    /// Session participants in sharing id order
    pub fn session_participants(&self) -> Vec<IdentityHash> {
        self.context.member_identities()
    }

    /// Next round to run: 1 or 2, 3 for aggregation, 4 once done, 0 after an abort
    pub fn round(&self) -> u32 {
        match self.state {
            CosignerState::Created => 1,
            CosignerState::NonceCommitted { .. } => 2,
            CosignerState::PartiallySigned(_) => 3,
            CosignerState::Done => 4,
            CosignerState::Aborted => 0,
        }
    }

    fn out_of_order(&self, called: &str) -> Error {
        Error::InvalidRound(format!(
            "{} called while expecting round {}",
            called,
            self.round()
        ))
    }

    /// Sample single-use nonces and commit to them
    pub fn round1<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<SignRound1Broadcast<C>> {
        if !matches!(self.state, CosignerState::Created) {
            return Err(self.out_of_order("signing round 1"));
        }
        let nonces = NoncePair::random(rng);
        let commitment = nonces.commitment();
        self.state = CosignerState::NonceCommitted { nonces, commitment };
        Ok(commitment)
    }

    /// Produce this party's partial signature on `message`
    ///
    /// `received` holds the round 1 broadcasts of the other session
    /// participants. The nonces are destroyed whether or not this succeeds.
    #[instrument(skip_all, fields(sharing_id = %self.context.my_sharing_id))]
    pub fn round2(
        &mut self,
        received: &HashMap<IdentityHash, SignRound1Broadcast<C>>,
        message: &[u8],
    ) -> Result<PartialSignature<C>> {
        if !matches!(self.state, CosignerState::NonceCommitted { .. }) {
            return Err(self.out_of_order("signing round 2"));
        }
        check_message(message)?;

        let (nonces, commitment) = match mem::replace(&mut self.state, CosignerState::Aborted) {
            CosignerState::NonceCommitted { nonces, commitment } => (nonces, commitment),
            other => {
                self.state = other;
                return Err(self.out_of_order("signing round 2"));
            }
        };

        let mut commitments: BTreeMap<IdentityHash, NonceCommitment<C>> = self
            .context
            .members
            .iter()
            .filter_map(|(_, identity)| received.get(identity).map(|c| (*identity, *c)))
            .collect();
        commitments.insert(self.context.my_identity, commitment);

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
        debug!("signing round 2 complete");
        Ok(partial)
    }

    /// Combine the session's partial signatures; aggregators only
    ///
    /// `partials` may omit this party's own partial signature.
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
            _ => return Err(self.out_of_order("aggregation")),
        };
        let signature = self.context.aggregate(stash, message, partials)?;
        self.state = CosignerState::Done;
        Ok(signature)
    }
}
