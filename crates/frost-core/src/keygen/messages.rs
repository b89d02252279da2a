//! DKG message types

use crate::curves::{Ciphersuite, Point, Scalar};
use crate::dlog::DlogProof;
use crate::encoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Round 1 broadcast: Feldman commitments and proof of knowledge of `a_0`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DkgRound1Broadcast<C: Ciphersuite> {
    /// Commitments to polynomial coefficients (Feldman VSS)
    #[serde(with = "encoding::points")]
    pub commitments: Vec<Point<C>>,
    /// Proof of knowledge of the discrete log of `commitments[0]`
    pub dlog_proof: DlogProof<C>,
}

/// Round 1 unicast: the recipient's share of the sender's polynomial
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DkgRound1P2P<C: Ciphersuite> {
    #[serde(with = "encoding::scalar")]
    pub share: Scalar<C>,
}

impl<C: Ciphersuite> fmt::Debug for DkgRound1P2P<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DkgRound1P2P { .. }")
    }
}

impl<C: Ciphersuite> Drop for DkgRound1P2P<C> {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}
