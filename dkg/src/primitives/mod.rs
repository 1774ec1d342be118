//! Operations over the Ed25519 group.
//!
//! # Acknowledgements
//!
//! _The following crates were used as a reference when implementing this module. If code is very similar
//! to the reference, it is accompanied by a comment._
//!
//! * <https://github.com/dalek-cryptography/curve25519-dalek>: Ed25519 group arithmetic.
//! * <https://github.com/dedis/kyber>: Embedding data into Ed25519 points and encrypting them with ElGamal.
//!
//! # Example
//!
//! ```rust
//! use ballot_dkg::primitives::{elgamal, group::Share, poly};
//! use rand::rngs::OsRng;
//!
//! // Configure threshold
//! let (n, t) = (5u32, 4u32);
//!
//! // Share a secret
//! let secret = poly::new_from(t - 1, &mut OsRng);
//! let public = secret.commit();
//! let shares: Vec<Share> = (0..n).map(|i| Share::from(secret.evaluate(i))).collect();
//!
//! // Encrypt to the group key
//! let (ciphertext, remainder) = elgamal::encrypt(&mut OsRng, public.constant(), b"hello world");
//! assert!(remainder.is_empty());
//!
//! // Combine partial decryptions
//! let partials: Vec<_> = shares.iter().map(|s| elgamal::partial_decrypt(s, &ciphertext)).collect();
//! let message = elgamal::combine(t, &partials).unwrap();
//! assert_eq!(elgamal::data(&message).unwrap(), b"hello world");
//! ```

pub mod elgamal;
pub mod group;
pub mod poly;
pub mod schnorr;

use thiserror::Error;

/// Errors that can occur when working with Ed25519 primitives.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("not enough evaluations: {0}/{1}")]
    NotEnoughEvaluations(usize, usize),
    #[error("duplicate polynomial evaluation point")]
    DuplicateEval,
    #[error("invalid Ed25519 curve point")]
    InvalidPoint,
    #[error("invalid Ed25519 scalar")]
    InvalidScalar,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid embedded length: {0}")]
    InvalidEmbedding(usize),
}
