//! Shamir secret sharing over a curve's scalar field

use crate::curves::{Ciphersuite, Point, Scalar};
use crate::types::SharingId;
use crate::{Error, Result};
use elliptic_curve::ff::Field;
use elliptic_curve::group::Group;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use zeroize::Zeroize;

/// A point `(id, f(id))` on a sharing polynomial; zeroized on drop
#[derive(Clone)]
pub struct Share<C: Ciphersuite> {
    pub id: SharingId,
    pub value: Scalar<C>,
}

impl<C: Ciphersuite> Share<C> {
    pub fn new(id: SharingId, value: Scalar<C>) -> Self {
        Self { id, value }
    }
}

impl<C: Ciphersuite> fmt::Debug for Share<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<C: Ciphersuite> Drop for Share<C> {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Polynomial with secret coefficients `a_0 .. a_{t-1}`; zeroized on drop
pub struct Polynomial<C: Ciphersuite> {
    coefficients: Vec<Scalar<C>>,
}

impl<C: Ciphersuite> Polynomial<C> {
    /// Random polynomial of the given degree with a fixed constant term
    pub fn random<R: RngCore + CryptoRng>(constant: Scalar<C>, degree: usize, rng: &mut R) -> Self {
        let mut coefficients = Vec::with_capacity(degree + 1);
        coefficients.push(constant);
        for _ in 0..degree {
            coefficients.push(Scalar::<C>::random(&mut *rng));
        }
        Self { coefficients }
    }

    pub fn coefficients(&self) -> &[Scalar<C>] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Horner evaluation at `x`
    pub fn evaluate(&self, x: &Scalar<C>) -> Scalar<C> {
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::<C>::ZERO, |acc, coef| acc * x + coef)
    }
}

impl<C: Ciphersuite> Drop for Polynomial<C> {
    fn drop(&mut self) {
        self.coefficients.zeroize();
    }
}

/// Lagrange coefficients at `x = 0` for the given evaluation points:
/// `λ_i = Π_{j≠i} x_j / (x_j − x_i)`
pub fn lagrange_coefficients<C: Ciphersuite>(
    ids: &[SharingId],
) -> Result<BTreeMap<SharingId, Scalar<C>>> {
    if ids.is_empty() {
        return Err(Error::InvalidArgument("no sharing ids given".into()));
    }
    let mut coefficients = BTreeMap::new();
    for &i in ids {
        let x_i: Scalar<C> = i.to_scalar();
        let mut numerator = Scalar::<C>::ONE;
        let mut denominator = Scalar::<C>::ONE;
        for &j in ids {
            if j == i {
                continue;
            }
            let x_j: Scalar<C> = j.to_scalar();
            numerator *= x_j;
            denominator *= x_j - x_i;
        }
        let inverse = Option::<Scalar<C>>::from(denominator.invert())
            .ok_or_else(|| Error::Failed("Lagrange denominator is not invertible".into()))?;
        if coefficients.insert(i, numerator * inverse).is_some() {
            return Err(Error::InvalidArgument(format!("duplicate sharing id {}", i)));
        }
    }
    Ok(coefficients)
}

/// (t, n) Shamir dealer and combiner
#[derive(Debug, Clone, Copy)]
pub struct Shamir<C: Ciphersuite> {
    threshold: usize,
    total: usize,
    _suite: PhantomData<C>,
}

impl<C: Ciphersuite> Shamir<C> {
    pub fn new(threshold: usize, total: usize) -> Result<Self> {
        if threshold < 2 {
            return Err(Error::InvalidConfig("Threshold must be at least 2".into()));
        }
        if threshold > total {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of parties".into(),
            ));
        }
        if u32::try_from(total).is_err() {
            return Err(Error::InvalidConfig("Too many parties".into()));
        }
        Ok(Self {
            threshold,
            total,
            _suite: PhantomData,
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Share `secret` as evaluations at `x = 1..=n`
    pub fn split<R: RngCore + CryptoRng>(&self, secret: &Scalar<C>, rng: &mut R) -> Vec<Share<C>> {
        let (_, shares) = self.split_with_polynomial(secret, rng);
        shares
    }

    /// Like [`Shamir::split`], also returning the sharing polynomial
    pub fn split_with_polynomial<R: RngCore + CryptoRng>(
        &self,
        secret: &Scalar<C>,
        rng: &mut R,
    ) -> (Polynomial<C>, Vec<Share<C>>) {
        let polynomial = Polynomial::random(*secret, self.threshold - 1, rng);
        let shares = self
            .ids()
            .map(|id| Share::new(id, polynomial.evaluate(&id.to_scalar())))
            .collect();
        (polynomial, shares)
    }

    /// All sharing ids `1..=n`
    pub fn ids(&self) -> impl Iterator<Item = SharingId> {
        (1..=self.total as u32).map(SharingId)
    }

    /// Lagrange coefficients for a subset of this dealer's ids
    pub fn lagrange_coefficients(&self, ids: &[SharingId]) -> Result<BTreeMap<SharingId, Scalar<C>>> {
        self.check_ids(ids)?;
        lagrange_coefficients::<C>(ids)
    }

    /// Reconstruct the secret from at least `t` shares
    pub fn combine(&self, shares: &[Share<C>]) -> Result<Scalar<C>> {
        let ids: Vec<SharingId> = shares.iter().map(|s| s.id).collect();
        let lambdas = self.lagrange_coefficients(&ids)?;
        Ok(shares
            .iter()
            .map(|share| lambdas[&share.id] * share.value)
            .fold(Scalar::<C>::ZERO, |acc, term| acc + term))
    }

    /// Reconstruct `g^secret` from at least `t` shares in the exponent
    pub fn combine_points(&self, shares: &[(SharingId, Point<C>)]) -> Result<Point<C>> {
        let ids: Vec<SharingId> = shares.iter().map(|(id, _)| *id).collect();
        let lambdas = self.lagrange_coefficients(&ids)?;
        Ok(shares
            .iter()
            .map(|(id, point)| *point * lambdas[id])
            .fold(Point::<C>::identity(), |acc, term| acc + term))
    }

    /// Turn a Shamir share into an additive share over the `present` set
    pub fn to_additive(&self, share: &Share<C>, present: &[SharingId]) -> Result<Scalar<C>> {
        if !present.contains(&share.id) {
            return Err(Error::InvalidArgument(format!(
                "share {} is not part of the present set",
                share.id
            )));
        }
        let lambdas = self.lagrange_coefficients(present)?;
        Ok(lambdas[&share.id] * share.value)
    }

    fn check_ids(&self, ids: &[SharingId]) -> Result<()> {
        if ids.len() < self.threshold {
            return Err(Error::InvalidArgument(format!(
                "need at least {} shares, got {}",
                self.threshold,
                ids.len()
            )));
        }
        if let Some(id) = ids.iter().find(|id| id.get() as usize > self.total) {
            return Err(Error::InvalidArgument(format!(
                "sharing id {} is out of range 1..={}",
                id, self.total
            )));
        }
        Ok(())
    }
}
