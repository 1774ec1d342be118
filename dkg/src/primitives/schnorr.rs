//! Schnorr signatures over Ed25519.
//!
//! Nonces are derived from the private key and the signed payload, so signing
//! requires no randomness and the same payload always yields the same signature.

use super::{
    group::{decode_point, decode_scalar, encode_point, KeyPair},
    Error,
};
use commonware_utils::union_unique;
use curve25519_dalek::{EdwardsPoint, Scalar};
use sha2::{Digest, Sha512};

/// Length of an encoded signature (`R || s`).
pub const SIGNATURE_LEN: usize = 64;

const NONCE_PREFIX: &[u8] = b"_SCHNORR_NONCE";

fn wide(hasher: Sha512) -> Scalar {
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&bytes)
}

fn challenge(r: &EdwardsPoint, public: &EdwardsPoint, payload: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(encode_point(r));
    hasher.update(encode_point(public));
    hasher.update(payload);
    wide(hasher)
}

/// Signs `msg` under `namespace`.
pub fn sign(key: &KeyPair, namespace: &[u8], msg: &[u8]) -> Vec<u8> {
    let payload = union_unique(namespace, msg);

    let mut hasher = Sha512::new();
    hasher.update(NONCE_PREFIX);
    hasher.update(key.private().as_bytes());
    hasher.update(&payload);
    let k = wide(hasher);

    let r = EdwardsPoint::mul_base(&k);
    let e = challenge(&r, key.public(), &payload);
    let s = k + e * key.private();

    let mut signature = Vec::with_capacity(SIGNATURE_LEN);
    signature.extend_from_slice(&encode_point(&r));
    signature.extend_from_slice(s.as_bytes());
    signature
}

/// Verifies a signature over `msg` under `namespace`.
pub fn verify(
    public: &EdwardsPoint,
    namespace: &[u8],
    msg: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    if signature.len() != SIGNATURE_LEN {
        return Err(Error::InvalidSignature);
    }
    let r = decode_point(&signature[..32]).map_err(|_| Error::InvalidSignature)?;
    let s = decode_scalar(&signature[32..]).map_err(|_| Error::InvalidSignature)?;
    let payload = union_unique(namespace, msg);
    let e = challenge(&r, public, &payload);
    if EdwardsPoint::mul_base(&s) != r + public * e {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}
