//! Long-term identity keys of cohort members
//!
//! Protocol state machines only ever see an identity's [`IdentityHash`]; the
//! keys themselves authenticate envelopes in the [`crate::mpc`] driver.

use crate::types::IdentityHash;
use crate::{Error, Result};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, RngCore};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Public identity of a party
pub trait IdentityKey: fmt::Debug + Send + Sync {
    /// Encoded public key
    fn public_key(&self) -> Vec<u8>;

    /// Fixed-width identifier, SHA3-256 of the public key
    fn hash(&self) -> IdentityHash {
        let digest = Sha3_256::digest(self.public_key());
        IdentityHash::new(digest.into())
    }

    /// Verify a signature made by this identity
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()>;
}

/// An identity together with its signing capability
pub trait AuthKey: IdentityKey {
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Ed25519 public identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ed25519IdentityKey(VerifyingKey);

impl Ed25519IdentityKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|e| Error::Deserialization(format!("invalid identity key: {}", e)))
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}

impl IdentityKey for Ed25519IdentityKey {
    fn public_key(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = ed25519_dalek::Signature::from_slice(signature)
            .map_err(|e| Error::VerificationFailed(e.to_string()))?;
        self.0
            .verify(message, &signature)
            .map_err(|e| Error::VerificationFailed(e.to_string()))
    }
}

/// Ed25519 identity with its secret key
#[derive(Clone)]
pub struct Ed25519AuthKey {
    signing_key: SigningKey,
}

impl Ed25519AuthKey {
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        zeroize::Zeroize::zeroize(&mut seed);
        Self { signing_key }
    }

    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Secret seed; callers are responsible for protecting it
    pub fn to_bytes(&self) -> zeroize::Zeroizing<[u8; 32]> {
        zeroize::Zeroizing::new(self.signing_key.to_bytes())
    }

    pub fn identity_key(&self) -> Ed25519IdentityKey {
        Ed25519IdentityKey(self.signing_key.verifying_key())
    }
}

impl fmt::Debug for Ed25519AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519AuthKey")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

impl IdentityKey for Ed25519AuthKey {
    fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        self.identity_key().verify(message, signature)
    }
}

impl AuthKey for Ed25519AuthKey {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_sign_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let key = Ed25519AuthKey::generate(&mut rng);
        let signature = key.sign(b"hello");

        key.identity_key().verify(b"hello", &signature).unwrap();
        assert!(key.identity_key().verify(b"hellO", &signature).is_err());
        assert!(key.identity_key().verify(b"hello", &signature[..10]).is_err());
    }

    #[test]
    fn test_hash_matches_between_public_and_secret_forms() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let key = Ed25519AuthKey::generate(&mut rng);
        assert_eq!(key.hash(), key.identity_key().hash());

        let restored = Ed25519AuthKey::from_bytes(&key.to_bytes());
        assert_eq!(restored.hash(), key.hash());

        let other = Ed25519AuthKey::generate(&mut rng);
        assert_ne!(other.hash(), key.hash());
    }
}
