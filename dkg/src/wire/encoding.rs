//! Serde adapters encoding bytes, points and scalars as base64 strings.

use crate::primitives::group::{decode_point, decode_scalar, encode_point, encode_scalar};
use base64::{engine::general_purpose::STANDARD, Engine};
use curve25519_dalek::{EdwardsPoint, Scalar};
use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

fn decode_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(D::Error::custom)
}

/// Raw bytes.
pub mod bytes {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        decode_base64(deserializer)
    }
}

/// A single canonical point.
pub mod point {
    use super::*;

    pub fn serialize<S: Serializer>(value: &EdwardsPoint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(encode_point(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<EdwardsPoint, D::Error> {
        let raw = decode_base64(deserializer)?;
        decode_point(&raw).map_err(D::Error::custom)
    }
}

/// A list of canonical points.
pub mod points {
    use super::*;
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(
        value: &[EdwardsPoint],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(value.len()))?;
        for point in value {
            seq.serialize_element(&STANDARD.encode(encode_point(point)))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<EdwardsPoint>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|e| {
                let raw = STANDARD.decode(e).map_err(D::Error::custom)?;
                decode_point(&raw).map_err(D::Error::custom)
            })
            .collect()
    }
}

/// A canonical scalar.
pub mod scalar {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(encode_scalar(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let raw = decode_base64(deserializer)?;
        decode_scalar(&raw).map_err(D::Error::custom)
    }
}
