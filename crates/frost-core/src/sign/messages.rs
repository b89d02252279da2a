//! Signing message types and nonce pairs

use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Point, Scalar};
use crate::encoding;
use crate::types::SharingId;
use crate::{Error, Result};
use elliptic_curve::ff::Field;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Round 1 broadcast: commitments `D = g^d`, `E = g^e` to a nonce pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SignRound1Broadcast<C: Ciphersuite> {
    #[serde(with = "encoding::point")]
    pub d: Point<C>,
    #[serde(with = "encoding::point")]
    pub e: Point<C>,
}

/// A published nonce commitment, the same shape as the round 1 broadcast
pub type NonceCommitment<C> = SignRound1Broadcast<C>;

impl<C: Ciphersuite> SignRound1Broadcast<C> {
    /// Reject identity commitments, blaming `sender`
    pub(crate) fn check(&self, sender: SharingId) -> Result<()> {
        if is_identity(&self.d) || is_identity(&self.e) {
            return Err(Error::abort(sender, "nonce commitment is the identity"));
        }
        Ok(())
    }
}

/// Single-use signing nonces `(d, e)`; zeroized on drop
pub struct NoncePair<C: Ciphersuite> {
    pub(crate) d: Scalar<C>,
    pub(crate) e: Scalar<C>,
}

impl<C: Ciphersuite> NoncePair<C> {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            d: Scalar::<C>::random(&mut *rng),
            e: Scalar::<C>::random(&mut *rng),
        }
    }

    pub fn commitment(&self) -> NonceCommitment<C> {
        SignRound1Broadcast {
            d: scalar_base_mult::<C>(&self.d),
            e: scalar_base_mult::<C>(&self.e),
        }
    }
}

impl<C: Ciphersuite> fmt::Debug for NoncePair<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoncePair { .. }")
    }
}

impl<C: Ciphersuite> Drop for NoncePair<C> {
    fn drop(&mut self) {
        self.d.zeroize();
        self.e.zeroize();
    }
}
