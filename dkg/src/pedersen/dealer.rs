//! Dealer side of a key generation: sharing one secret polynomial.

use super::{
    ops::{seal, session_id, PlainDeal},
    types::Deal,
    Error,
};
use crate::primitives::{
    group::KeyPair,
    poly::{self, Private, Public},
};
use curve25519_dalek::{EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};

/// Secret polynomial of one participant and the commitments it publishes.
pub struct Dealer {
    index: u32,
    secret: Private,
    commitments: Public,
    session_id: [u8; 32],
}

impl Dealer {
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        index: u32,
        participants: &[EdwardsPoint],
        threshold: u32,
    ) -> Self {
        let secret = poly::new_from(threshold - 1, rng);
        let commitments = secret.commit();
        let session_id = session_id(
            &participants[index as usize],
            participants,
            &commitments,
            threshold,
        );
        Self {
            index,
            secret,
            commitments,
            session_id,
        }
    }

    pub fn commitments(&self) -> &Public {
        &self.commitments
    }

    pub fn session_id(&self) -> [u8; 32] {
        self.session_id
    }

    /// Returns the evaluation of the secret polynomial owed to `verifier`.
    pub fn share(&self, verifier: u32) -> Scalar {
        self.secret.evaluate(verifier).value
    }

    /// Creates the encrypted deal for the participant at `verifier`.
    pub fn deal<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        key: &KeyPair,
        participants: &[EdwardsPoint],
        verifier: u32,
    ) -> Result<Deal, Error> {
        let plain = PlainDeal {
            session_id: self.session_id.to_vec(),
            index: verifier,
            share: self.share(verifier),
            threshold: self.commitments.required(),
            commitments: self.commitments.coefficients().to_vec(),
        };
        seal(
            rng,
            key,
            self.index,
            participants,
            &participants[verifier as usize],
            &plain,
        )
    }
}
