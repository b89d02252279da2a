//! Feldman verifiable secret sharing
//!
//! The dealer publishes `C_k = g^{a_k}` for every coefficient of the sharing
//! polynomial, which lets each recipient check its share without learning
//! anything beyond `g^{secret}`.

use super::shamir::{Polynomial, Shamir, Share};
use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Point, Scalar};
use crate::types::SharingId;
use crate::{Error, Result};
use elliptic_curve::group::Group;
use rand_core::{CryptoRng, RngCore};

/// Feldman dealer: Shamir shares plus coefficient commitments
#[derive(Debug, Clone, Copy)]
pub struct Feldman<C: Ciphersuite> {
    shamir: Shamir<C>,
}

impl<C: Ciphersuite> Feldman<C> {
    pub fn new(threshold: usize, total: usize) -> Result<Self> {
        Ok(Self {
            shamir: Shamir::new(threshold, total)?,
        })
    }

    pub fn shamir(&self) -> &Shamir<C> {
        &self.shamir
    }

    /// Share `secret`, returning `(commitments, shares)`
    pub fn split<R: RngCore + CryptoRng>(
        &self,
        secret: &Scalar<C>,
        rng: &mut R,
    ) -> (Vec<Point<C>>, Vec<Share<C>>) {
        let (polynomial, shares) = self.shamir.split_with_polynomial(secret, rng);
        (commit(&polynomial), shares)
    }
}

/// `g^{a_k}` for every coefficient
pub fn commit<C: Ciphersuite>(polynomial: &Polynomial<C>) -> Vec<Point<C>> {
    polynomial
        .coefficients()
        .iter()
        .map(scalar_base_mult::<C>)
        .collect()
}

/// `Π_k C_k^{id^k}`, the committed polynomial evaluated in the exponent
pub fn evaluate_in_exponent<C: Ciphersuite>(commitments: &[Point<C>], id: SharingId) -> Point<C> {
    let x: Scalar<C> = id.to_scalar();
    commitments
        .iter()
        .rev()
        .fold(Point::<C>::identity(), |acc, commitment| acc * x + commitment)
}

/// Accept iff `g^{share} = Π_k C_k^{id^k}`
pub fn verify<C: Ciphersuite>(share: &Share<C>, commitments: &[Point<C>]) -> Result<()> {
    if commitments.is_empty() {
        return Err(Error::VerificationFailed("no commitments".into()));
    }
    if commitments.iter().skip(1).any(is_identity) {
        return Err(Error::VerificationFailed(
            "commitment to a non-constant coefficient is the identity".into(),
        ));
    }
    if scalar_base_mult::<C>(&share.value) != evaluate_in_exponent::<C>(commitments, share.id) {
        return Err(Error::VerificationFailed(format!(
            "share {} does not match the commitments",
            share.id
        )));
    }
    Ok(())
}
