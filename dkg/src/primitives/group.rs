//! Points, scalars and keys on Ed25519.

use super::{poly::Eval, Error};
use curve25519_dalek::{edwards::CompressedEdwardsY, EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an encoded point or scalar.
pub const ENCODED_LEN: usize = 32;

/// Encodes a point in its canonical compressed form.
pub fn encode_point(point: &EdwardsPoint) -> [u8; ENCODED_LEN] {
    point.compress().to_bytes()
}

/// Decodes a point from its canonical compressed form.
///
/// Bytes that decompress but do not re-encode to themselves are rejected.
pub fn decode_point(bytes: &[u8]) -> Result<EdwardsPoint, Error> {
    let bytes: [u8; ENCODED_LEN] = bytes.try_into().map_err(|_| Error::InvalidPoint)?;
    let compressed = CompressedEdwardsY(bytes);
    let point = compressed.decompress().ok_or(Error::InvalidPoint)?;
    if point.compress() != compressed {
        return Err(Error::InvalidPoint);
    }
    Ok(point)
}

/// Encodes a scalar as 32 little-endian bytes.
pub fn encode_scalar(scalar: &Scalar) -> [u8; ENCODED_LEN] {
    scalar.to_bytes()
}

/// Decodes a canonical little-endian scalar.
pub fn decode_scalar(bytes: &[u8]) -> Result<Scalar, Error> {
    let bytes: [u8; ENCODED_LEN] = bytes.try_into().map_err(|_| Error::InvalidScalar)?;
    Option::from(Scalar::from_canonical_bytes(bytes)).ok_or(Error::InvalidScalar)
}

/// Returns the evaluation point of the participant at `index`.
///
/// Participants are evaluated at `index + 1` so that no share ever sits at `x = 0`.
pub fn evaluation_point(index: u32) -> Scalar {
    Scalar::from(u64::from(index) + 1)
}

/// Long-term key of a node.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    private: Scalar,
    public: EdwardsPoint,
}

impl KeyPair {
    /// Generates a new key pair from the provided RNG.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self::from_private(Scalar::random(rng))
    }

    /// Derives the public key of the provided private scalar.
    pub fn from_private(private: Scalar) -> Self {
        let public = EdwardsPoint::mul_base(&private);
        Self { private, public }
    }

    pub fn private(&self) -> &Scalar {
        &self.private
    }

    pub fn public(&self) -> &EdwardsPoint {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &commonware_utils::hex(&encode_point(&self.public)))
            .finish()
    }
}

/// Private share of the group key held by one participant.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// Position of the holder in the participant list.
    pub index: u32,
    /// Evaluation of the shared polynomial at `index + 1`.
    pub private: Scalar,
}

impl Share {
    /// Returns the public commitment to this share.
    pub fn public(&self) -> EdwardsPoint {
        EdwardsPoint::mul_base(&self.private)
    }
}

impl From<Eval<Scalar>> for Share {
    fn from(eval: Eval<Scalar>) -> Self {
        Self {
            index: eval.index,
            private: eval.value,
        }
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share").field("index", &self.index).finish()
    }
}
