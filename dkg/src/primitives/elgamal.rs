//! ElGamal encryption of short messages embedded into Ed25519 points.
//!
//! A ciphertext is `(K, C) = (k·G, k·P + M)` where `P` is the group key and `M`
//! the point carrying the message. Holders of a [Share] of the private key each
//! publish `C − v·K`; any `t` of these interpolate at zero to `M` directly
//! (the Lagrange coefficients sum to one).

use super::{
    group::{encode_point, Share, ENCODED_LEN},
    poly::{self, Eval},
    Error,
};
use curve25519_dalek::{edwards::CompressedEdwardsY, EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};

/// Maximum number of bytes that can be embedded into a single point.
///
/// One byte carries the length and one byte of randomness is kept on top
/// so that a valid point is found quickly.
pub const EMBED_LEN: usize = (255 - 8 - 8) / 8;

/// ElGamal ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    /// Ephemeral key `k·G`.
    pub k: EdwardsPoint,
    /// Masked message `k·P + M`.
    pub c: EdwardsPoint,
}

/// Embeds up to [EMBED_LEN] bytes of `data` into a point of the prime-order subgroup.
///
/// Returns the point and the number of bytes embedded.
pub fn embed<R: RngCore + CryptoRng>(rng: &mut R, data: &[u8]) -> (EdwardsPoint, usize) {
    let len = data.len().min(EMBED_LEN);
    loop {
        let mut bytes = [0u8; ENCODED_LEN];
        rng.fill_bytes(&mut bytes);
        bytes[0] = len as u8;
        bytes[1..1 + len].copy_from_slice(&data[..len]);

        let compressed = CompressedEdwardsY(bytes);
        let Some(point) = compressed.decompress() else {
            continue;
        };
        if !point.is_torsion_free() || point.compress() != compressed {
            continue;
        }
        return (point, len);
    }
}

/// Extracts the bytes embedded into a point.
pub fn data(point: &EdwardsPoint) -> Result<Vec<u8>, Error> {
    let bytes = encode_point(point);
    let len = bytes[0] as usize;
    if len > EMBED_LEN {
        return Err(Error::InvalidEmbedding(len));
    }
    Ok(bytes[1..1 + len].to_vec())
}

/// Encrypts the longest embeddable prefix of `msg` to `public`.
///
/// Returns the ciphertext and the bytes that did not fit.
pub fn encrypt<R: RngCore + CryptoRng>(
    rng: &mut R,
    public: &EdwardsPoint,
    msg: &[u8],
) -> (Ciphertext, Vec<u8>) {
    let (m, len) = embed(rng, msg);
    let k = Scalar::random(rng);
    let ciphertext = Ciphertext {
        k: EdwardsPoint::mul_base(&k),
        c: public * k + m,
    };
    (ciphertext, msg[len..].to_vec())
}

/// Computes the partial decryption `C − v·K` of a share holder.
pub fn partial_decrypt(share: &Share, ciphertext: &Ciphertext) -> Eval<EdwardsPoint> {
    Eval {
        index: share.index,
        value: ciphertext.c - ciphertext.k * share.private,
    }
}

/// Combines at least `t` partial decryptions into the embedded message point.
pub fn combine<'a, I>(t: u32, partials: I) -> Result<EdwardsPoint, Error>
where
    I: IntoIterator<Item = &'a Eval<EdwardsPoint>>,
{
    poly::recover(t, partials)
}
