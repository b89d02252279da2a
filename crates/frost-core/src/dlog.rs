//! Schnorr proof of knowledge of a discrete logarithm
//!
//! Non-interactive via a `merlin` transcript. Callers label the transcript
//! with whatever context the proof must be bound to (protocol, sharing id);
//! the session id and the full statement are absorbed here.

use crate::curves::{Ciphersuite, Curve, Point, Scalar};
use crate::encoding::{self, point_to_bytes};
use crate::{Error, Result};
use elliptic_curve::ff::Field;
use merlin::Transcript;
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Proof that the prover knows `x` with `X = G^x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct DlogProof<C: Ciphersuite> {
    /// Prover commitment `K = G^k`
    #[serde(with = "encoding::point")]
    pub commitment: Point<C>,
    /// Response `s = k + c·x`
    #[serde(with = "encoding::scalar")]
    pub response: Scalar<C>,
}

fn challenge<C: Ciphersuite>(
    generator: &Point<C>,
    statement: &Point<C>,
    commitment: &Point<C>,
    session_id: &[u8],
    transcript: &mut Transcript,
) -> Scalar<C> {
    transcript.append_message(b"dlog-session-id", session_id);
    transcript.append_message(b"dlog-suite", C::NAME.as_bytes());
    transcript.append_message(b"dlog-generator", &point_to_bytes(generator));
    transcript.append_message(b"dlog-statement", &point_to_bytes(statement));
    transcript.append_message(b"dlog-commitment", &point_to_bytes(commitment));

    let mut bytes = [0u8; 64];
    transcript.challenge_bytes(b"dlog-challenge", &mut bytes);
    <C::Curve as Curve>::scalar_from_hash(&bytes)
}

/// Prove knowledge of `secret`, returning the proof and the statement `G^secret`
pub fn prove<C: Ciphersuite, R: RngCore + CryptoRng>(
    generator: &Point<C>,
    session_id: &[u8],
    transcript: &mut Transcript,
    secret: &Scalar<C>,
    rng: &mut R,
) -> (DlogProof<C>, Point<C>) {
    let statement = *generator * *secret;
    let mut k = Scalar::<C>::random(&mut *rng);
    let commitment = *generator * k;
    let c = challenge::<C>(generator, &statement, &commitment, session_id, transcript);
    let response = k + c * secret;
    k.zeroize();

    (
        DlogProof {
            commitment,
            response,
        },
        statement,
    )
}

/// Check `G^s = K + X^c` under a transcript built the same way as the prover's
pub fn verify<C: Ciphersuite>(
    generator: &Point<C>,
    statement: &Point<C>,
    proof: &DlogProof<C>,
    session_id: &[u8],
    transcript: &mut Transcript,
) -> Result<()> {
    let c = challenge::<C>(generator, statement, &proof.commitment, session_id, transcript);
    if *generator * proof.response != proof.commitment + *statement * c {
        return Err(Error::VerificationFailed("invalid discrete log proof".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{Ed25519Sha512, P256Sha256, Secp256k1Sha256};
    use elliptic_curve::group::Group;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn transcript(label: &[u8]) -> Transcript {
        let mut t = Transcript::new(b"dlog-test");
        t.append_message(b"label", label);
        t
    }

    fn binds_context<C: Ciphersuite>() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let g = Point::<C>::generator();
        let secret = Scalar::<C>::random(&mut rng);
        let (proof, statement) = prove::<C, _>(&g, b"session-a", &mut transcript(b"1"), &secret, &mut rng);

        verify::<C>(&g, &statement, &proof, b"session-a", &mut transcript(b"1")).unwrap();
        assert!(verify::<C>(&g, &statement, &proof, b"session-b", &mut transcript(b"1")).is_err());
        assert!(verify::<C>(&g, &statement, &proof, b"session-a", &mut transcript(b"2")).is_err());

        let other = statement + g;
        assert!(verify::<C>(&g, &other, &proof, b"session-a", &mut transcript(b"1")).is_err());
    }

    #[test]
    fn test_dlog_ed25519() {
        binds_context::<Ed25519Sha512>();
    }

    #[test]
    fn test_dlog_secp256k1() {
        binds_context::<Secp256k1Sha256>();
    }

    #[test]
    fn test_dlog_p256() {
        binds_context::<P256Sha256>();
    }
}
