//! Pedersen distributed key generation over Ed25519.
//!
//! Every participant acts as both a dealer and a verifier. As a dealer, it samples a
//! secret polynomial of degree `t − 1`, publishes Feldman commitments to its coefficients,
//! and sends each verifier its evaluation encrypted to that verifier's long-term key. As a
//! verifier, it checks each received evaluation against the dealer's commitments and
//! broadcasts a signed [types::DealerResponse] approving (or complaining about) the deal.
//!
//! Once every verifier has responded to every dealer, the qualified set is the dealers
//! approved by everyone. The group key is the sum of the qualified dealers' constant
//! commitments and each participant's share is the sum of the evaluations it received
//! from qualified dealers.
//!
//! # Deal Encryption
//!
//! A deal for verifier `j` is encrypted under a fresh Diffie-Hellman key `X = x·G`:
//! the ChaCha20-Poly1305 key is derived from `x·P_j` and the plaintext carries the
//! session identifier, the share, the threshold and the commitments. The dealer signs
//! `X` with its long-term key and signs the whole encrypted deal, so a verifier only
//! decrypts deals that come from the participant at the claimed index.
//!
//! # Example
//!
//! ```rust
//! use ballot_dkg::{byzantine_threshold, pedersen::Generator, primitives::group::KeyPair};
//! use rand::rngs::OsRng;
//!
//! let keys: Vec<KeyPair> = (0..4).map(|_| KeyPair::generate(&mut OsRng)).collect();
//! let participants: Vec<_> = keys.iter().map(|k| *k.public()).collect();
//! let t = byzantine_threshold(keys.len() as u32);
//!
//! let mut generators: Vec<Generator> = keys
//!     .iter()
//!     .map(|k| Generator::new(&mut OsRng, k.clone(), participants.clone(), t).unwrap())
//!     .collect();
//!
//! // Deal
//! let mut deals = Vec::new();
//! for generator in &generators {
//!     deals.extend(generator.deals(&mut OsRng).unwrap());
//! }
//!
//! // Respond
//! let mut responses = Vec::new();
//! for (verifier, deal) in deals {
//!     responses.push(generators[verifier as usize].process_deal(&deal).unwrap());
//! }
//! for response in responses {
//!     for generator in generators.iter_mut() {
//!         if generator.index() != response.response.index {
//!             generator.process_response(&response).unwrap();
//!         }
//!     }
//! }
//!
//! // Finalize
//! let outputs: Vec<_> = generators.iter().map(|g| g.finalize().unwrap()).collect();
//! assert!(outputs.iter().all(|o| o.public.constant() == outputs[0].public.constant()));
//! ```

mod dealer;
mod generator;
mod ops;
mod player;
pub mod types;

pub use generator::{Generator, Output};

use crate::primitives;
use thiserror::Error;

/// Errors that can occur during a Pedersen key generation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("unknown participant")]
    UnknownParticipant,
    #[error("invalid threshold: {0}/{1}")]
    InvalidThreshold(u32, u32),
    #[error("invalid dealer: {0}")]
    InvalidDealer(u32),
    #[error("invalid verifier: {0}")]
    InvalidVerifier(u32),
    #[error("duplicate deal: {0}")]
    DuplicateDeal(u32),
    #[error("duplicate response: dealer={0} verifier={1}")]
    DuplicateResponse(u32, u32),
    #[error("unknown dealer: {0}")]
    UnknownDealer(u32),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("deal decryption failed")]
    DecryptionFailed,
    #[error("malformed deal")]
    MalformedDeal,
    #[error("invalid session id")]
    InvalidSessionId,
    #[error("invalid share index: {0}")]
    InvalidShareIndex(u32),
    #[error("not certified")]
    NotCertified,
    #[error("insufficient qualified dealers: {0}/{1}")]
    InsufficientQualified(usize, u32),
    #[error("primitive: {0}")]
    Primitive(#[from] primitives::Error),
}
