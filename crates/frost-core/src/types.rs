//! Core types shared by DKG and signing

use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Curve, CurveId, Point, Scalar};
use crate::encoding;
use crate::identity::IdentityKey;
use crate::sharing::feldman;
use crate::{Error, Result};
use elliptic_curve::ff::PrimeField;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use zeroize::Zeroize;

/// Unique identifier for a protocol session, agreed on out of band
pub type SessionId = [u8; 32];

/// Fixed-width identifier of a cohort member
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityHash([u8; 32]);

impl IdentityHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityHash({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for IdentityHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for IdentityHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("Invalid identity hash length"))?;
        Ok(IdentityHash(array))
    }
}

/// Shamir evaluation point of a party, `1..=n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SharingId(pub(crate) u32);

impl SharingId {
    pub fn new(id: u32) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidArgument("sharing id must be non-zero".into()));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The id as a field element
    pub fn to_scalar<S: PrimeField>(self) -> S {
        S::from(u64::from(self.0))
    }

    pub(crate) fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl TryFrom<u32> for SharingId {
    type Error = Error;

    fn try_from(id: u32) -> Result<Self> {
        SharingId::new(id)
    }
}

impl From<SharingId> for u32 {
    fn from(id: SharingId) -> u32 {
        id.0
    }
}

impl fmt::Display for SharingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of a signing cohort
///
/// Sharing ids are assigned by sorting the participants' identity hashes, so
/// every member derives the same assignment without communicating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct CohortConfig<C: Ciphersuite> {
    curve: CurveId,
    threshold: usize,
    participants: Vec<IdentityHash>,
    signature_aggregators: BTreeSet<IdentityHash>,
    #[serde(skip)]
    _suite: PhantomData<C>,
}

impl<C: Ciphersuite> CohortConfig<C> {
    /// Create a cohort from identity keys
    pub fn new<K: IdentityKey>(threshold: usize, participants: &[K], aggregators: &[K]) -> Result<Self> {
        Self::from_hashes(
            threshold,
            participants.iter().map(|k| k.hash()).collect(),
            aggregators.iter().map(|k| k.hash()).collect(),
        )
    }

    /// Create a cohort from identity hashes
    pub fn from_hashes(
        threshold: usize,
        mut participants: Vec<IdentityHash>,
        aggregators: Vec<IdentityHash>,
    ) -> Result<Self> {
        participants.sort();
        let config = Self {
            curve: C::Curve::ID,
            threshold,
            participants,
            signature_aggregators: aggregators.into_iter().collect(),
            _suite: PhantomData,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the cohort invariants; deserialized configs must be validated
    pub fn validate(&self) -> Result<()> {
        if self.curve != C::Curve::ID {
            return Err(Error::InvalidConfig(format!(
                "cohort is for {}, not {}",
                self.curve,
                C::Curve::ID
            )));
        }
        let n = self.participants.len();
        if self.threshold < 2 {
            return Err(Error::InvalidConfig("Threshold must be at least 2".into()));
        }
        if self.threshold > n {
            return Err(Error::InvalidConfig(
                "Threshold cannot exceed number of parties".into(),
            ));
        }
        if u32::try_from(n).is_err() {
            return Err(Error::InvalidConfig("Too many parties".into()));
        }
        if self.participants.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::InvalidConfig("Duplicate participant identity".into()));
        }
        if !self.participants.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::InvalidConfig("Participants are not sorted".into()));
        }
        if self.signature_aggregators.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one signature aggregator is required".into(),
            ));
        }
        if let Some(outsider) = self
            .signature_aggregators
            .iter()
            .find(|a| !self.is_participant(a))
        {
            return Err(Error::InvalidConfig(format!(
                "Signature aggregator {:?} is not a participant",
                outsider
            )));
        }
        Ok(())
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn total_parties(&self) -> usize {
        self.participants.len()
    }

    /// Participants in sharing id order
    pub fn participants(&self) -> &[IdentityHash] {
        &self.participants
    }

    pub fn signature_aggregators(&self) -> impl Iterator<Item = &IdentityHash> {
        self.signature_aggregators.iter()
    }

    pub fn is_participant(&self, identity: &IdentityHash) -> bool {
        self.participants.binary_search(identity).is_ok()
    }

    pub fn is_signature_aggregator(&self, identity: &IdentityHash) -> bool {
        self.signature_aggregators.contains(identity)
    }

    pub fn sharing_id(&self, identity: &IdentityHash) -> Option<SharingId> {
        self.participants
            .binary_search(identity)
            .ok()
            .map(|index| SharingId(index as u32 + 1))
    }

    pub fn identity(&self, id: SharingId) -> Option<IdentityHash> {
        self.participants.get(id.0 as usize - 1).copied()
    }

    /// `(sharing id, identity)` pairs in sharing id order
    pub fn sharing_ids(&self) -> impl Iterator<Item = (SharingId, IdentityHash)> + '_ {
        self.participants
            .iter()
            .enumerate()
            .map(|(index, identity)| (SharingId(index as u32 + 1), *identity))
    }

    pub(crate) fn require_sharing_id(&self, identity: &IdentityHash) -> Result<SharingId> {
        self.sharing_id(identity)
            .ok_or_else(|| Error::InvalidArgument(format!("{:?} is not in the cohort", identity)))
    }
}

/// A party's additive share of the group signing key
#[derive(Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct SigningKeyShare<C: Ciphersuite> {
    #[serde(with = "encoding::scalar")]
    pub share: Scalar<C>,
    #[serde(with = "encoding::point")]
    pub public_key: Point<C>,
}

impl<C: Ciphersuite> fmt::Debug for SigningKeyShare<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyShare")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

impl<C: Ciphersuite> Drop for SigningKeyShare<C> {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

/// Public verification data produced by DKG
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublicKeyShares<C: Ciphersuite> {
    /// Group public key `g^x`
    #[serde(with = "encoding::point")]
    pub public_key: Point<C>,
    /// `Y_j = g^{x_j}` per participant
    #[serde(with = "encoding::point_map")]
    pub shares: BTreeMap<IdentityHash, Point<C>>,
    /// Sum of every dealer's Feldman commitment vector
    #[serde(with = "encoding::points")]
    pub commitments: Vec<Point<C>>,
}

impl<C: Ciphersuite> PublicKeyShares<C> {
    pub fn share_of(&self, identity: &IdentityHash) -> Option<&Point<C>> {
        self.shares.get(identity)
    }

    /// Re-derive every share from the combined commitments and compare
    pub fn validate(&self, cohort: &CohortConfig<C>) -> Result<()> {
        if self.commitments.len() != cohort.threshold() {
            return Err(Error::VerificationFailed(format!(
                "expected {} commitments, got {}",
                cohort.threshold(),
                self.commitments.len()
            )));
        }
        if self.commitments[0] != self.public_key {
            return Err(Error::VerificationFailed(
                "public key does not match the constant commitment".into(),
            ));
        }
        if is_identity(&self.public_key) {
            return Err(Error::VerificationFailed("public key is the identity".into()));
        }
        if self.shares.len() != cohort.total_parties() {
            return Err(Error::VerificationFailed(format!(
                "expected {} public key shares, got {}",
                cohort.total_parties(),
                self.shares.len()
            )));
        }
        for (id, identity) in cohort.sharing_ids() {
            let share = self
                .shares
                .get(&identity)
                .ok_or_else(|| Error::Missing(format!("public key share of party {}", id)))?;
            if is_identity(share) {
                return Err(Error::VerificationFailed(format!(
                    "public key share of party {} is the identity",
                    id
                )));
            }
            if *share != feldman::evaluate_in_exponent::<C>(&self.commitments, id) {
                return Err(Error::VerificationFailed(format!(
                    "public key share of party {} is inconsistent with the commitments",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// Everything a cohort member keeps after DKG
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Shard<C: Ciphersuite> {
    pub signing_key_share: SigningKeyShare<C>,
    pub public_key_shares: PublicKeyShares<C>,
}

impl<C: Ciphersuite> Shard<C> {
    pub fn public_key(&self) -> &Point<C> {
        &self.public_key_shares.public_key
    }

    /// Check the shard against the cohort and the holder's identity
    pub fn validate(&self, cohort: &CohortConfig<C>, holder: &IdentityHash) -> Result<()> {
        self.public_key_shares.validate(cohort)?;
        if self.signing_key_share.public_key != self.public_key_shares.public_key {
            return Err(Error::VerificationFailed(
                "signing key share and public key shares disagree on the public key".into(),
            ));
        }
        let expected = self
            .public_key_shares
            .share_of(holder)
            .ok_or_else(|| Error::Missing("own public key share".into()))?;
        if scalar_base_mult::<C>(&self.signing_key_share.share) != *expected {
            return Err(Error::VerificationFailed(
                "signing key share does not match its public key share".into(),
            ));
        }
        Ok(())
    }
}

/// One cosigner's contribution `z_i`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PartialSignature<C: Ciphersuite> {
    #[serde(with = "encoding::scalar")]
    pub z: Scalar<C>,
}

/// Schnorr signature `(R, z)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Signature<C: Ciphersuite> {
    #[serde(with = "encoding::point")]
    pub r: Point<C>,
    #[serde(with = "encoding::scalar")]
    pub z: Scalar<C>,
}

impl<C: Ciphersuite> Signature<C> {
    /// `R || z` in the curve's native encodings
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = encoding::point_to_bytes(&self.r);
        bytes.extend_from_slice(&encoding::scalar_to_bytes(&self.z));
        bytes
    }

    /// Verify against a group public key
    pub fn verify(&self, public_key: &Point<C>, message: &[u8]) -> Result<()> {
        crate::schnorr::verify::<C>(self, public_key, message)
    }
}
