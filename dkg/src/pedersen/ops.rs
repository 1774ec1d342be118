//! Hashing, signing payloads and deal encryption shared by dealers and verifiers.

use super::{
    types::{Deal, DealerResponse, EncryptedDeal},
    Error,
};
use crate::{
    primitives::{
        group::{decode_point, encode_point, KeyPair},
        poly::Public,
        schnorr,
    },
    wire::encoding,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use curve25519_dalek::{EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

pub(super) const DEAL_NAMESPACE: &[u8] = b"_BALLOT_DKG_DEAL";
pub(super) const DH_NAMESPACE: &[u8] = b"_BALLOT_DKG_DH";
pub(super) const RESPONSE_NAMESPACE: &[u8] = b"_BALLOT_DKG_RESPONSE";
const KEY_NAMESPACE: &[u8] = b"_BALLOT_DKG_KEY";

const NONCE_LEN: usize = 12;

/// Identifier of one dealer's sharing, binding its key, the verifiers, its commitments and the threshold.
pub(super) fn session_id(
    dealer: &EdwardsPoint,
    verifiers: &[EdwardsPoint],
    commitments: &Public,
    threshold: u32,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(encode_point(dealer));
    for verifier in verifiers {
        hasher.update(encode_point(verifier));
    }
    for commitment in commitments.coefficients() {
        hasher.update(encode_point(commitment));
    }
    hasher.update(threshold.to_le_bytes());
    hasher.finalize().into()
}

/// Associated data of every deal in one key generation.
fn context(dealer: &EdwardsPoint, verifiers: &[EdwardsPoint]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(encode_point(dealer));
    for verifier in verifiers {
        hasher.update(encode_point(verifier));
    }
    hasher.finalize().into()
}

fn derive_key(shared: &EdwardsPoint, dh_key: &EdwardsPoint, verifier: &EdwardsPoint) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_NAMESPACE);
    hasher.update(encode_point(shared));
    hasher.update(encode_point(dh_key));
    hasher.update(encode_point(verifier));
    hasher.finalize().into()
}

/// Payload covered by [Deal::signature].
pub(super) fn deal_payload(index: u32, deal: &EncryptedDeal) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&index.to_le_bytes());
    for field in [&deal.dh_key, &deal.signature, &deal.nonce, &deal.cipher] {
        payload.extend_from_slice(&(field.len() as u32).to_le_bytes());
        payload.extend_from_slice(field);
    }
    payload
}

/// Payload covered by [DealerResponse::signature].
pub(super) fn response_payload(response: &DealerResponse) -> Vec<u8> {
    let mut payload = Vec::with_capacity(response.session_id.len() + 5);
    payload.extend_from_slice(&response.session_id);
    payload.extend_from_slice(&response.index.to_le_bytes());
    payload.push(response.status as u8);
    payload
}

/// Contents of a deal once decrypted.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct PlainDeal {
    #[serde(rename = "SessionID", with = "encoding::bytes")]
    pub session_id: Vec<u8>,
    pub index: u32,
    #[serde(with = "encoding::scalar")]
    pub share: Scalar,
    pub threshold: u32,
    #[serde(with = "encoding::points")]
    pub commitments: Vec<EdwardsPoint>,
}

impl Drop for PlainDeal {
    fn drop(&mut self) {
        self.share.zeroize();
    }
}

/// Encrypts and signs a deal for `verifier`.
pub(super) fn seal<R: RngCore + CryptoRng>(
    rng: &mut R,
    dealer: &KeyPair,
    index: u32,
    participants: &[EdwardsPoint],
    verifier: &EdwardsPoint,
    plain: &PlainDeal,
) -> Result<Deal, Error> {
    let ephemeral = Scalar::random(rng);
    let dh_key = EdwardsPoint::mul_base(&ephemeral);
    let key = derive_key(&(verifier * ephemeral), &dh_key, verifier);

    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);
    let mut msg = serde_json::to_vec(plain).map_err(|_| Error::MalformedDeal)?;
    let aad = context(dealer.public(), participants);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key)).encrypt(
        Nonce::from_slice(&nonce),
        Payload {
            msg: &msg,
            aad: &aad,
        },
    );
    msg.zeroize();
    let cipher = cipher.map_err(|_| Error::DecryptionFailed)?;

    let dh_key = encode_point(&dh_key).to_vec();
    let encrypted = EncryptedDeal {
        signature: schnorr::sign(dealer, DH_NAMESPACE, &dh_key),
        dh_key,
        nonce: nonce.to_vec(),
        cipher,
    };
    Ok(Deal {
        index,
        signature: schnorr::sign(dealer, DEAL_NAMESPACE, &deal_payload(index, &encrypted)),
        encrypted_deal: encrypted,
    })
}

/// Verifies the signatures on a deal and decrypts it with the verifier's long-term key.
pub(super) fn open(
    verifier: &KeyPair,
    dealer: &EdwardsPoint,
    participants: &[EdwardsPoint],
    deal: &Deal,
) -> Result<PlainDeal, Error> {
    let encrypted = &deal.encrypted_deal;
    schnorr::verify(
        dealer,
        DEAL_NAMESPACE,
        &deal_payload(deal.index, encrypted),
        &deal.signature,
    )
    .map_err(|_| Error::InvalidSignature)?;
    schnorr::verify(dealer, DH_NAMESPACE, &encrypted.dh_key, &encrypted.signature)
        .map_err(|_| Error::InvalidSignature)?;
    if encrypted.nonce.len() != NONCE_LEN {
        return Err(Error::MalformedDeal);
    }

    let dh_key = decode_point(&encrypted.dh_key)?;
    let key = derive_key(&(dh_key * verifier.private()), &dh_key, verifier.public());
    let aad = context(dealer, participants);
    let mut msg = ChaCha20Poly1305::new(Key::from_slice(&key))
        .decrypt(
            Nonce::from_slice(&encrypted.nonce),
            Payload {
                msg: &encrypted.cipher,
                aad: &aad,
            },
        )
        .map_err(|_| Error::DecryptionFailed)?;
    let plain = serde_json::from_slice(&msg).map_err(|_| Error::MalformedDeal);
    msg.zeroize();
    plain
}
