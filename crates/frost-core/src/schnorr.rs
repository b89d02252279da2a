//! Schnorr signature verification
//!
//! Threshold signatures are ordinary Schnorr signatures under the group key:
//! `g^z = R + c·Y` with `c = H(R || Y || m)`. Over Ed25519/SHA-512 this is the
//! RFC 8032 equation, so signatures also verify with any Ed25519 library.

use crate::curves::{is_identity, scalar_base_mult, Ciphersuite, Point};
use crate::types::Signature;
use crate::{Error, Result};
use tracing::trace;

/// Verify `signature` on `message` under `public_key`
pub fn verify<C: Ciphersuite>(
    signature: &Signature<C>,
    public_key: &Point<C>,
    message: &[u8],
) -> Result<()> {
    if is_identity(public_key) || is_identity(&signature.r) {
        return Err(Error::InvalidSignature);
    }
    let c = C::challenge(&signature.r, public_key, message);
    if scalar_base_mult::<C>(&signature.z) != signature.r + *public_key * c {
        trace!(suite = C::NAME, "signature equation does not hold");
        return Err(Error::InvalidSignature);
    }
    Ok(())
}
