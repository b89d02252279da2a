//! Curve capability and cipher suites
//!
//! The protocol code is generic over [`Ciphersuite`], a pairing of a prime-order
//! group (through the `ff`/`group` traits) and a hash function. The set of
//! supported curves is closed and tagged by [`CurveId`]; curve-specific
//! behaviour that matters for security (cofactor handling on Edwards25519) is
//! keyed off that tag instead of being discovered at runtime.

use crate::{Error, Result};
use digest::Digest;
use elliptic_curve::bigint::{U256, U512};
use elliptic_curve::ff::{Field, PrimeField};
use elliptic_curve::group::{Group, GroupEncoding};
use elliptic_curve::ops::Reduce;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Scalar type of a cipher suite
pub type Scalar<C> = <<C as Ciphersuite>::Curve as Curve>::Scalar;

/// Point type of a cipher suite
pub type Point<C> = <<C as Ciphersuite>::Curve as Curve>::Point;

/// Tag of every curve the protocols run over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveId {
    Edwards25519,
    Secp256k1,
    P256,
}

impl CurveId {
    /// Cofactor of the curve group
    pub const fn cofactor(self) -> u64 {
        match self {
            CurveId::Edwards25519 => 8,
            CurveId::Secp256k1 | CurveId::P256 => 1,
        }
    }

    /// Whether points received from peers may carry a small-order component
    pub const fn has_cofactor(self) -> bool {
        self.cofactor() > 1
    }

    pub const fn name(self) -> &'static str {
        match self {
            CurveId::Edwards25519 => "edwards25519",
            CurveId::Secp256k1 => "secp256k1",
            CurveId::P256 => "p256",
        }
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "edwards25519" | "ed25519" => Ok(CurveId::Edwards25519),
            "secp256k1" | "k256" => Ok(CurveId::Secp256k1),
            "p256" | "p-256" | "secp256r1" => Ok(CurveId::P256),
            other => Err(Error::InvalidArgument(format!("unknown curve: {}", other))),
        }
    }
}

/// Group and field operations of one curve
pub trait Curve: Copy + Clone + fmt::Debug + Default + Eq + Send + Sync + 'static {
    const ID: CurveId;

    type Scalar: PrimeField + Zeroize;
    type Point: Group<Scalar = Self::Scalar> + GroupEncoding;

    /// Reduce a hash output to a scalar, in the curve's native byte order
    ///
    /// Inputs are digests or transcript challenges of at most
    /// [`WIDE_BYTES`] bytes; only the leading [`WIDE_BYTES`] of a longer
    /// input are used.
    fn scalar_from_hash(bytes: &[u8]) -> Self::Scalar;

    /// Whether `point` has a component outside the prime-order subgroup.
    ///
    /// Only consulted when `Self::ID.has_cofactor()`.
    fn has_low_order_component(_point: &Self::Point) -> bool {
        false
    }
}

/// Edwards25519 via `curve25519-dalek`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edwards25519;

impl Curve for Edwards25519 {
    const ID: CurveId = CurveId::Edwards25519;

    type Scalar = curve25519_dalek::Scalar;
    type Point = curve25519_dalek::EdwardsPoint;

    fn scalar_from_hash(bytes: &[u8]) -> Self::Scalar {
        let n = bytes.len().min(WIDE_BYTES);
        let mut wide = [0u8; WIDE_BYTES];
        wide[..n].copy_from_slice(&bytes[..n]);
        let scalar = curve25519_dalek::Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        scalar
    }

    fn has_low_order_component(point: &Self::Point) -> bool {
        point.is_small_order() || !point.is_torsion_free()
    }
}

/// secp256k1 via `k256`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Secp256k1;

impl Curve for Secp256k1 {
    const ID: CurveId = CurveId::Secp256k1;

    type Scalar = k256::Scalar;
    type Point = k256::ProjectivePoint;

    fn scalar_from_hash(bytes: &[u8]) -> Self::Scalar {
        let mut wide = k256::WideBytes::default();
        let n = bytes.len().min(WIDE_BYTES);
        wide[WIDE_BYTES - n..].copy_from_slice(&bytes[..n]);
        let scalar = <k256::Scalar as Reduce<U512>>::reduce_bytes(&wide);
        wide[..].zeroize();
        scalar
    }
}

/// NIST P-256 via `p256`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct P256;

impl Curve for P256 {
    const ID: CurveId = CurveId::P256;

    type Scalar = p256::Scalar;
    type Point = p256::ProjectivePoint;

    /// `p256` only reduces 256-bit integers, so a wide input is split as
    /// `hi·2^256 + lo`
    fn scalar_from_hash(bytes: &[u8]) -> Self::Scalar {
        let n = bytes.len().min(WIDE_BYTES);
        let mut wide = [0u8; WIDE_BYTES];
        wide[WIDE_BYTES - n..].copy_from_slice(&bytes[..n]);

        let mut hi = p256::FieldBytes::default();
        let mut lo = p256::FieldBytes::default();
        hi.copy_from_slice(&wide[..32]);
        lo.copy_from_slice(&wide[32..]);
        wide.zeroize();

        let two_256 = <p256::Scalar as Reduce<U256>>::reduce(U256::MAX) + p256::Scalar::ONE;
        let scalar = <p256::Scalar as Reduce<U256>>::reduce_bytes(&hi) * two_256
            + <p256::Scalar as Reduce<U256>>::reduce_bytes(&lo);
        hi[..].zeroize();
        lo[..].zeroize();
        scalar
    }
}

/// Widest hash output reduced to a scalar: a SHA-512 digest
pub const WIDE_BYTES: usize = 64;

/// A curve together with the hash used for challenges and binding factors
pub trait Ciphersuite: Copy + Clone + fmt::Debug + Default + Eq + Send + Sync + 'static {
    type Curve: Curve;
    type Hash: Digest;

    const NAME: &'static str;

    /// Hash the concatenation of `parts` into a scalar
    fn hash_to_scalar(parts: &[&[u8]]) -> Scalar<Self> {
        let mut hasher = <Self::Hash as Digest>::new();
        for part in parts {
            Digest::update(&mut hasher, part);
        }
        let digest = hasher.finalize();
        <Self::Curve as Curve>::scalar_from_hash(&digest[..])
    }

    /// Schnorr challenge `c = H(R || Y || m)`
    fn challenge(r: &Point<Self>, public_key: &Point<Self>, message: &[u8]) -> Scalar<Self> {
        let r_bytes = r.to_bytes();
        let y_bytes = public_key.to_bytes();
        Self::hash_to_scalar(&[r_bytes.as_ref(), y_bytes.as_ref(), message])
    }
}

/// Edwards25519 with SHA-512; challenges match RFC 8032 Ed25519
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ed25519Sha512;

impl Ciphersuite for Ed25519Sha512 {
    type Curve = Edwards25519;
    type Hash = sha2::Sha512;

    const NAME: &'static str = "FROST-ED25519-SHA512";
}

/// secp256k1 with SHA-256
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Secp256k1Sha256;

impl Ciphersuite for Secp256k1Sha256 {
    type Curve = Secp256k1;
    type Hash = sha2::Sha256;

    const NAME: &'static str = "FROST-SECP256K1-SHA256";
}

/// P-256 with SHA-256
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct P256Sha256;

impl Ciphersuite for P256Sha256 {
    type Curve = P256;
    type Hash = sha2::Sha256;

    const NAME: &'static str = "FROST-P256-SHA256";
}

/// `g^s`
pub fn scalar_base_mult<C: Ciphersuite>(scalar: &Scalar<C>) -> Point<C> {
    Point::<C>::generator() * *scalar
}

pub(crate) fn is_identity<P: Group>(point: &P) -> bool {
    bool::from(point.is_identity())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_id_parsing() {
        assert_eq!("ed25519".parse::<CurveId>().unwrap(), CurveId::Edwards25519);
        assert_eq!("SECP256K1".parse::<CurveId>().unwrap(), CurveId::Secp256k1);
        assert_eq!("p-256".parse::<CurveId>().unwrap(), CurveId::P256);
        assert!("bn254".parse::<CurveId>().is_err());
        assert!(CurveId::Edwards25519.has_cofactor());
        assert!(!CurveId::Secp256k1.has_cofactor());
    }

    #[test]
    fn test_short_hash_reduces_as_big_endian_integer() {
        assert_eq!(Secp256k1::scalar_from_hash(&[0x01, 0x00]), k256::Scalar::from(256u64));
        assert_eq!(P256::scalar_from_hash(&[0x01, 0x00]), p256::Scalar::from(256u64));
        assert_eq!(P256::scalar_from_hash(&[]), p256::Scalar::ZERO);
    }

    #[test]
    fn test_digest_reduction_matches_crate_reduce() {
        let digest = [0xffu8; 32];
        let k = <k256::Scalar as Reduce<U256>>::reduce_bytes(&k256::FieldBytes::from(digest));
        assert_eq!(Secp256k1::scalar_from_hash(&digest), k);
        let p = <p256::Scalar as Reduce<U256>>::reduce_bytes(&p256::FieldBytes::from(digest));
        assert_eq!(P256::scalar_from_hash(&digest), p);
    }

    #[test]
    fn test_wide_reduction_agrees_across_weierstrass_curves() {
        // 2^256 + 5 reduced two ways: the high half carries exactly 2^256
        let mut wide = [0u8; WIDE_BYTES];
        wide[31] = 1;
        wide[63] = 5;
        let two_256 = <p256::Scalar as Reduce<U256>>::reduce(U256::MAX) + p256::Scalar::ONE;
        assert_eq!(P256::scalar_from_hash(&wide), two_256 + p256::Scalar::from(5u64));

        let k_two_256 = <k256::Scalar as Reduce<U256>>::reduce(U256::MAX) + k256::Scalar::ONE;
        assert_eq!(Secp256k1::scalar_from_hash(&wide), k_two_256 + k256::Scalar::from(5u64));
    }

    #[test]
    fn test_edwards_wide_reduction_matches_dalek() {
        let bytes = [0xabu8; 64];
        let expected = curve25519_dalek::Scalar::from_bytes_mod_order_wide(&bytes);
        assert_eq!(Edwards25519::scalar_from_hash(&bytes), expected);

        let mut short = [0u8; WIDE_BYTES];
        short[..2].copy_from_slice(&[0x00, 0x01]);
        assert_eq!(Edwards25519::scalar_from_hash(&[0x00, 0x01]), curve25519_dalek::Scalar::from_bytes_mod_order_wide(&short));
    }

    #[test]
    fn test_edwards_low_order_detection() {
        use curve25519_dalek::constants::EIGHT_TORSION;

        let torsion = EIGHT_TORSION[1];
        assert!(Edwards25519::has_low_order_component(&torsion));

        let honest = scalar_base_mult::<Ed25519Sha512>(&curve25519_dalek::Scalar::from(7u64));
        assert!(!Edwards25519::has_low_order_component(&honest));
        assert!(Edwards25519::has_low_order_component(&(honest + torsion)));
    }
}
