//! Hex serde helpers for curve points and scalars
//!
//! Points use their compressed `GroupEncoding`; the identity, which several
//! curves cannot encode in compressed form, is written as an empty string.

use crate::curves::is_identity;
use crate::{Error, Result};
use elliptic_curve::ff::PrimeField;
use elliptic_curve::group::{Group, GroupEncoding};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Compressed point bytes, empty for the identity
pub fn point_to_bytes<P: Group + GroupEncoding>(point: &P) -> Vec<u8> {
    if is_identity(point) {
        Vec::new()
    } else {
        point.to_bytes().as_ref().to_vec()
    }
}

/// Decode a point, rejecting off-curve and non-canonical encodings
pub fn point_from_bytes<P: Group + GroupEncoding>(bytes: &[u8]) -> Result<P> {
    if bytes.is_empty() {
        return Ok(P::identity());
    }
    let mut repr = P::Repr::default();
    if repr.as_ref().len() != bytes.len() {
        return Err(Error::Deserialization(format!(
            "point must be {} bytes, got {}",
            repr.as_ref().len(),
            bytes.len()
        )));
    }
    repr.as_mut().copy_from_slice(bytes);
    let point = Option::<P>::from(P::from_bytes(&repr))
        .ok_or_else(|| Error::Deserialization("point is not on the curve".into()))?;
    // One byte form per point: SEC1 tags other than 0x02/0x03 decode too
    if point.to_bytes().as_ref() != bytes {
        return Err(Error::Deserialization("point encoding is not canonical".into()));
    }
    Ok(point)
}

pub fn scalar_to_bytes<S: PrimeField>(scalar: &S) -> Vec<u8> {
    scalar.to_repr().as_ref().to_vec()
}

/// Decode a canonical scalar
pub fn scalar_from_bytes<S: PrimeField>(bytes: &[u8]) -> Result<S> {
    let mut repr = S::Repr::default();
    if repr.as_ref().len() != bytes.len() {
        return Err(Error::Deserialization(format!(
            "scalar must be {} bytes, got {}",
            repr.as_ref().len(),
            bytes.len()
        )));
    }
    repr.as_mut().copy_from_slice(bytes);
    Option::<S>::from(S::from_repr(repr))
        .ok_or_else(|| Error::Deserialization("scalar is not canonical".into()))
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| Error::Deserialization(e.to_string()))
}

pub(crate) mod point {
    use super::*;

    pub fn serialize<P, S>(point: &P, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        P: Group + GroupEncoding,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(point_to_bytes(point)))
    }

    pub fn deserialize<'de, P, D>(deserializer: D) -> std::result::Result<P, D::Error>
    where
        P: Group + GroupEncoding,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s)
            .and_then(|bytes| point_from_bytes(&bytes))
            .map_err(de::Error::custom)
    }
}

pub(crate) mod points {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<P, S>(points: &Vec<P>, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        P: Group + GroupEncoding,
        S: Serializer,
    {
        serializer.collect_seq(points.iter().map(|p| hex::encode(point_to_bytes(p))))
    }

    pub fn deserialize<'de, P, D>(deserializer: D) -> std::result::Result<Vec<P>, D::Error>
    where
        P: Group + GroupEncoding,
        D: Deserializer<'de>,
    {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| decode_hex(s).and_then(|bytes| point_from_bytes(&bytes)))
            .collect::<Result<Vec<P>>>()
            .map_err(de::Error::custom)
    }
}

pub(crate) mod point_map {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    pub fn serialize<K, P, S>(
        map: &BTreeMap<K, P>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        K: Serialize,
        P: Group + GroupEncoding,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, p)| (k, hex::encode(point_to_bytes(p)))))
    }

    pub fn deserialize<'de, K, P, D>(deserializer: D) -> std::result::Result<BTreeMap<K, P>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        P: Group + GroupEncoding,
        D: Deserializer<'de>,
    {
        BTreeMap::<K, String>::deserialize(deserializer)?
            .into_iter()
            .map(|(k, s)| {
                decode_hex(&s)
                    .and_then(|bytes| point_from_bytes(&bytes))
                    .map(|p| (k, p))
            })
            .collect::<Result<BTreeMap<K, P>>>()
            .map_err(de::Error::custom)
    }
}

pub(crate) mod scalar {
    use super::*;

    pub fn serialize<F, S>(scalar: &F, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        F: PrimeField,
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(scalar_to_bytes(scalar)))
    }

    pub fn deserialize<'de, F, D>(deserializer: D) -> std::result::Result<F, D::Error>
    where
        F: PrimeField,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s)
            .and_then(|bytes| scalar_from_bytes(&bytes))
            .map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{scalar_base_mult, Ed25519Sha512, P256Sha256, Secp256k1Sha256};

    #[test]
    fn test_identity_encodes_empty() {
        let identity = k256::ProjectivePoint::IDENTITY;
        assert!(point_to_bytes(&identity).is_empty());
        let decoded: k256::ProjectivePoint = point_from_bytes(&[]).unwrap();
        assert_eq!(decoded, identity);
    }

    #[test]
    fn test_rejects_wrong_length_and_off_curve() {
        let p = scalar_base_mult::<Secp256k1Sha256>(&k256::Scalar::from(5u64));
        let mut bytes = point_to_bytes(&p);
        assert_eq!(bytes.len(), 33);
        assert!(point_from_bytes::<k256::ProjectivePoint>(&bytes[..32]).is_err());

        // An invalid SEC1 tag
        bytes[0] = 0x05;
        assert!(point_from_bytes::<k256::ProjectivePoint>(&bytes).is_err());
    }

    #[test]
    fn test_compact_sec1_tag_rejected() {
        let k = scalar_base_mult::<Secp256k1Sha256>(&k256::Scalar::from(9u64));
        let mut bytes = point_to_bytes(&k);
        let decoded: k256::ProjectivePoint = point_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, k);
        bytes[0] = 0x05;
        assert!(matches!(
            point_from_bytes::<k256::ProjectivePoint>(&bytes),
            Err(Error::Deserialization(_))
        ));

        let p = scalar_base_mult::<P256Sha256>(&p256::Scalar::from(9u64));
        let mut bytes = point_to_bytes(&p);
        let decoded: p256::ProjectivePoint = point_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, p);
        bytes[0] = 0x05;
        assert!(matches!(
            point_from_bytes::<p256::ProjectivePoint>(&bytes),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_edwards_point_round_trips_canonically() {
        let e = scalar_base_mult::<Ed25519Sha512>(&curve25519_dalek::Scalar::from(9u64));
        let bytes = point_to_bytes(&e);
        let decoded: curve25519_dalek::EdwardsPoint = point_from_bytes(&bytes).unwrap();
        assert_eq!(decoded, e);
    }

    #[test]
    fn test_non_canonical_scalar_rejected() {
        let bytes = [0xffu8; 32];
        assert!(scalar_from_bytes::<curve25519_dalek::Scalar>(&bytes).is_err());

        let s = curve25519_dalek::Scalar::from(42u64);
        let decoded: curve25519_dalek::Scalar = scalar_from_bytes(&scalar_to_bytes(&s)).unwrap();
        assert_eq!(decoded, s);
        let _ = scalar_base_mult::<Ed25519Sha512>(&decoded);
    }
}
