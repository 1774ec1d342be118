//! Verifier side of a key generation: checking deals against their commitments.

use super::{
    ops::{open, response_payload, session_id, RESPONSE_NAMESPACE},
    types::{Deal, DealerResponse},
    Error,
};
use crate::primitives::{
    group::KeyPair,
    poly::{Poly, Public},
    schnorr,
};
use curve25519_dalek::{EdwardsPoint, Scalar};

/// Outcome of checking a deal.
pub struct Verified {
    pub session_id: [u8; 32],
    pub commitments: Public,
    /// The share, if it matches the commitments.
    pub share: Option<Scalar>,
}

/// Opens a deal addressed to the verifier at `index` and checks it.
///
/// A deal that cannot be authenticated, decrypted or bound to its session is an error.
/// A deal whose share does not match the commitments is returned without a share
/// (the verifier complains about it).
pub fn verify(
    key: &KeyPair,
    index: u32,
    participants: &[EdwardsPoint],
    threshold: u32,
    deal: &Deal,
) -> Result<Verified, Error> {
    let dealer = participants
        .get(deal.index as usize)
        .ok_or(Error::InvalidDealer(deal.index))?;
    let plain = open(key, dealer, participants, deal)?;

    let commitments = Poly::from(plain.commitments.clone());
    if plain.threshold != threshold || commitments.required() != threshold {
        return Err(Error::InvalidThreshold(commitments.required(), threshold));
    }
    let expected = session_id(dealer, participants, &commitments, threshold);
    if plain.session_id.as_slice() != expected.as_slice() {
        return Err(Error::InvalidSessionId);
    }
    if plain.index != index {
        return Err(Error::InvalidShareIndex(plain.index));
    }

    let share = (EdwardsPoint::mul_base(&plain.share) == commitments.evaluate(index).value)
        .then_some(plain.share);
    Ok(Verified {
        session_id: expected,
        commitments,
        share,
    })
}

/// Signs the verdict of the verifier at `index` on a session.
pub fn respond(key: &KeyPair, index: u32, session_id: [u8; 32], status: bool) -> DealerResponse {
    let mut response = DealerResponse {
        session_id: session_id.to_vec(),
        index,
        status,
        signature: Vec::new(),
    };
    response.signature = schnorr::sign(key, RESPONSE_NAMESPACE, &response_payload(&response));
    response
}

/// Checks the signature of a verifier on a response.
pub fn check(verifier: &EdwardsPoint, response: &DealerResponse) -> Result<(), Error> {
    schnorr::verify(
        verifier,
        RESPONSE_NAMESPACE,
        &response_payload(response),
        &response.signature,
    )
    .map_err(|_| Error::InvalidSignature)
}
