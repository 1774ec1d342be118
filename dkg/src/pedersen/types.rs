//! Messages exchanged between dealers and verifiers.
//!
//! Byte fields are opaque outside of this module and travel base64-encoded.

use crate::wire::encoding;
use serde::{Deserialize, Serialize};

/// A deal encrypted to a single verifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EncryptedDeal {
    /// Ephemeral Diffie-Hellman key of the dealer.
    #[serde(rename = "DHKey", with = "encoding::bytes")]
    pub dh_key: Vec<u8>,
    /// Signature of the dealer over the ephemeral key.
    #[serde(with = "encoding::bytes")]
    pub signature: Vec<u8>,
    #[serde(with = "encoding::bytes")]
    pub nonce: Vec<u8>,
    #[serde(with = "encoding::bytes")]
    pub cipher: Vec<u8>,
}

/// A deal sent by the dealer at `index` to one verifier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Deal {
    /// Position of the dealer in the participant list.
    pub index: u32,
    /// Signature of the dealer over the index and the encrypted deal.
    #[serde(with = "encoding::bytes")]
    pub signature: Vec<u8>,
    pub encrypted_deal: EncryptedDeal,
}

/// The verdict of one verifier on one deal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DealerResponse {
    #[serde(rename = "SessionID", with = "encoding::bytes")]
    pub session_id: Vec<u8>,
    /// Position of the verifier in the participant list.
    pub index: u32,
    /// Whether the verifier approves the deal.
    pub status: bool,
    #[serde(with = "encoding::bytes")]
    pub signature: Vec<u8>,
}

/// A verifier response to the deal of the dealer at `index`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Response {
    /// Position of the dealer in the participant list.
    pub index: u32,
    pub response: DealerResponse,
}
