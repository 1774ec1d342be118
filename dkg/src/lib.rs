//! Generate a threshold Ed25519 key among a ballot committee and decrypt ElGamal ciphertexts with it.
//!
//! # Overview
//!
//! Each node of the committee runs a [handler::Handler] per ballot. An initiator asks every
//! handler to [wire::Start] a Pedersen key generation ([pedersen]) among the committee. Once the
//! handlers certify, each holds a share of a private key whose public counterpart (the group
//! key) is reported back to the initiator. Any node can then [actor::Actor::encrypt] messages to
//! the group key and [actor::Actor::decrypt] ciphertexts by collecting partial decryptions from
//! at least [byzantine_threshold] handlers.
//!
//! Handlers can be configured to only decrypt ciphertexts that appear in the output of a
//! ballot shuffle ([shuffle]), so the committee never acts as a decryption oracle for
//! ciphertexts still linkable to their voters.
//!
//! # Transport
//!
//! Handlers and actors exchange [wire::Message]s over any transport implementing
//! [p2p::Sender] and [p2p::Receiver]. Each node uses two channels: [PROTOCOL_CHANNEL],
//! on which handlers receive requests and key generation traffic, and [STREAM_CHANNEL], on
//! which actors receive replies. [simulated] provides an in-memory transport.
//!
//! # Status
//!
//! `ballot-dkg` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod actor;
pub mod handler;
pub mod p2p;
pub mod pedersen;
pub mod primitives;
pub mod registry;
pub mod shuffle;
pub mod simulated;
pub mod wire;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Channel on which handlers receive messages.
pub const PROTOCOL_CHANNEL: p2p::Channel = 0;

/// Channel on which actors receive replies from handlers.
pub const STREAM_CHANNEL: p2p::Channel = 1;

/// Returns the number of shares required to act on behalf of `n` participants.
///
/// Tolerates fewer than one third of the participants being faulty.
pub fn byzantine_threshold(n: u32) -> u32 {
    n - n.saturating_sub(1) / 3
}

/// Transport-routable address of a node.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(#[serde(with = "wire::encoding::bytes")] Vec<u8>);

impl Address {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<Vec<u8>> for Address {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Address and long-term public key of a committee member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Identity {
    pub address: Address,
    #[serde(with = "wire::encoding::point")]
    pub public_key: curve25519_dalek::EdwardsPoint,
}

/// Errors that can occur when generating a key or decrypting with it.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed start: {0}")]
    MalformedStart(&'static str),
    #[error("malformed reply from {0}")]
    MalformedReply(Address),
    #[error("invalid ciphertext")]
    InvalidCiphertext,
    #[error("unknown ballot: {0}")]
    UnknownBallot(String),
    #[error("not initialized")]
    NotInitialized,
    #[error("already set up")]
    AlreadySetUp,
    #[error("already started")]
    AlreadyStarted,
    #[error("aborted")]
    Aborted,
    #[error("unexpected message: {0}")]
    UnexpectedMessage(&'static str),
    #[error("inconsistent group key")]
    InconsistentGroupKey,
    #[error("insufficient shares: {0}/{1}")]
    InsufficientShares(usize, u32),
    #[error("certification timeout")]
    CertificationTimeout,
    #[error("decrypt failed: {0}")]
    DecryptFailed(&'static str),
    #[error("not shuffled")]
    NotShuffled,
    #[error("refused by {0}: {1}")]
    Refused(Address, String),
    #[error("send failed: {0}")]
    SendFailed(Address),
    #[error("transport: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("already registered")]
    AlreadyRegistered,
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(&'static str),
    #[error("wire: {0}")]
    Wire(#[from] wire::Error),
    #[error("pedersen: {0}")]
    Pedersen(#[from] pedersen::Error),
    #[error("primitive: {0}")]
    Primitive(#[from] primitives::Error),
}
