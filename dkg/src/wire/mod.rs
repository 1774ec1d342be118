//! Messages exchanged between actors and handlers and their JSON encoding.
//!
//! Every message travels as an envelope naming exactly one variant:
//!
//! ```json
//! { "StartDone": { "PublicKey": "<base64 point>" } }
//! ```
//!
//! Points and scalars are encoded in their canonical 32-byte form and, like every
//! other byte field, base64-encoded. Integers are JSON numbers.
//!
//! Requests an actor sends (`Start`, `DecryptRequest`) may carry a `Session` that handlers copy
//! into every reply they cause (`StartDone`, `DecryptReply`, `Failure`), so the actor can tell
//! the replies of its current operation from late replies of an earlier one. The field is
//! omitted when zero.

pub mod encoding;

use crate::{
    pedersen::types::{Deal, Response},
    primitives::elgamal::Ciphertext,
    Address,
};
use bytes::Bytes;
use curve25519_dalek::EdwardsPoint;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when decoding a message.
#[derive(Error, Debug)]
pub enum Error {
    #[error("message is empty")]
    Empty,
    #[error("message has {0} variants")]
    Ambiguous(usize),
    #[error("couldn't decode message: {0}")]
    Json(#[from] serde_json::Error),
}

fn is_zero(session: &u64) -> bool {
    *session == 0
}

/// Starts a key generation among the listed participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Start {
    pub addresses: Vec<Address>,
    #[serde(with = "encoding::points")]
    pub public_keys: Vec<EdwardsPoint>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub session: u64,
}

/// Reports the certified group key to the initiator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartDone {
    #[serde(with = "encoding::point")]
    pub public_key: EdwardsPoint,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub session: u64,
}

/// Asks for the partial decryption of a ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    #[serde(rename = "K", with = "encoding::point")]
    pub k: EdwardsPoint,
    #[serde(rename = "C", with = "encoding::point")]
    pub c: EdwardsPoint,
    #[serde(rename = "BallotId", default)]
    pub ballot_id: String,
    #[serde(rename = "Session", default, skip_serializing_if = "is_zero")]
    pub session: u64,
}

impl DecryptRequest {
    pub fn ciphertext(&self) -> Ciphertext {
        Ciphertext {
            k: self.k,
            c: self.c,
        }
    }
}

/// Partial decryption `C − v·K` of the share at `i`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptReply {
    #[serde(rename = "I", default)]
    pub i: i64,
    #[serde(rename = "V", with = "encoding::point")]
    pub v: EdwardsPoint,
    #[serde(rename = "Session", default, skip_serializing_if = "is_zero")]
    pub session: u64,
}

/// Long-term public key of the answering node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetPeerPubKeyResp {
    #[serde(with = "encoding::point")]
    pub public_key: EdwardsPoint,
}

/// Refusal of a request, with the reason it was refused.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Failure {
    pub reason: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub session: u64,
}

/// A message of the key generation and decryption protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Start(Start),
    Deal(Deal),
    Response(Response),
    StartDone(StartDone),
    DecryptRequest(DecryptRequest),
    DecryptReply(DecryptReply),
    GetPeerPubKey,
    GetPeerPubKeyResp(GetPeerPubKeyResp),
    Failure(Failure),
}

impl Message {
    /// Name of the variant, as it appears in the envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Start(_) => "Start",
            Message::Deal(_) => "Deal",
            Message::Response(_) => "Response",
            Message::StartDone(_) => "StartDone",
            Message::DecryptRequest(_) => "DecryptRequest",
            Message::DecryptReply(_) => "DecryptReply",
            Message::GetPeerPubKey => "GetPeerPubKey",
            Message::GetPeerPubKeyResp(_) => "GetPeerPubKeyResp",
            Message::Failure(_) => "Failure",
        }
    }

    /// Session of the operation the message belongs to, zero if none.
    pub fn session(&self) -> u64 {
        match self {
            Message::Start(m) => m.session,
            Message::StartDone(m) => m.session,
            Message::DecryptRequest(m) => m.session,
            Message::DecryptReply(m) => m.session,
            Message::Failure(m) => m.session,
            _ => 0,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct Empty {}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    start: Option<Start>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deal: Option<Deal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_done: Option<StartDone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decrypt_request: Option<DecryptRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decrypt_reply: Option<DecryptReply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    get_peer_pub_key: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    get_peer_pub_key_resp: Option<GetPeerPubKeyResp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        let mut envelope = Envelope::default();
        match message {
            Message::Start(m) => envelope.start = Some(m),
            Message::Deal(m) => envelope.deal = Some(m),
            Message::Response(m) => envelope.response = Some(m),
            Message::StartDone(m) => envelope.start_done = Some(m),
            Message::DecryptRequest(m) => envelope.decrypt_request = Some(m),
            Message::DecryptReply(m) => envelope.decrypt_reply = Some(m),
            Message::GetPeerPubKey => envelope.get_peer_pub_key = Some(Empty {}),
            Message::GetPeerPubKeyResp(m) => envelope.get_peer_pub_key_resp = Some(m),
            Message::Failure(m) => envelope.failure = Some(m),
        }
        envelope
    }
}

impl TryFrom<Envelope> for Message {
    type Error = Error;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let mut messages = Vec::with_capacity(1);
        if let Some(m) = envelope.start {
            messages.push(Message::Start(m));
        }
        if let Some(m) = envelope.deal {
            messages.push(Message::Deal(m));
        }
        if let Some(m) = envelope.response {
            messages.push(Message::Response(m));
        }
        if let Some(m) = envelope.start_done {
            messages.push(Message::StartDone(m));
        }
        if let Some(m) = envelope.decrypt_request {
            messages.push(Message::DecryptRequest(m));
        }
        if let Some(m) = envelope.decrypt_reply {
            messages.push(Message::DecryptReply(m));
        }
        if envelope.get_peer_pub_key.is_some() {
            messages.push(Message::GetPeerPubKey);
        }
        if let Some(m) = envelope.get_peer_pub_key_resp {
            messages.push(Message::GetPeerPubKeyResp(m));
        }
        if let Some(m) = envelope.failure {
            messages.push(Message::Failure(m));
        }
        match messages.len() {
            0 => Err(Error::Empty),
            1 => Ok(messages.remove(0)),
            n => Err(Error::Ambiguous(n)),
        }
    }
}

/// Encodes a message into its JSON envelope.
pub fn encode(message: Message) -> Bytes {
    // Serializing plain structs with string keys cannot fail
    let encoded = serde_json::to_vec(&Envelope::from(message)).unwrap_or_default();
    Bytes::from(encoded)
}

/// Decodes a message from its JSON envelope.
pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    Message::try_from(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pedersen::types::{DealerResponse, EncryptedDeal},
        primitives::group::decode_point,
    };

    // Base64 of 32 zero bytes, a valid point
    const POINT: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    fn point() -> EdwardsPoint {
        decode_point(&[0u8; 32]).unwrap()
    }

    fn roundtrip(message: Message) {
        let encoded = encode(message.clone());
        assert_eq!(decode(&encoded).unwrap(), message);
    }

    #[test]
    fn test_start() {
        let message = Message::Start(Start {
            addresses: vec![Address::from("fake_addr")],
            public_keys: vec![point()],
            session: 0,
        });
        let expected = format!(
            r#"{{"Start":{{"Addresses":["ZmFrZV9hZGRy"],"PublicKeys":["{POINT}"]}}}}"#
        );
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_start_ignores_threshold() {
        let raw = format!(
            r#"{{"Start":{{"Threshold":3,"Addresses":["ZmFrZV9hZGRy"],"PublicKeys":["{POINT}"]}}}}"#
        );
        let Message::Start(start) = decode(raw.as_bytes()).unwrap() else {
            panic!("unexpected message");
        };
        assert_eq!(start.addresses, vec![Address::from("fake_addr")]);
    }

    #[test]
    fn test_deal() {
        let message = Message::Deal(Deal {
            index: 1,
            signature: vec![1],
            encrypted_deal: EncryptedDeal::default(),
        });
        let expected = r#"{"Deal":{"Index":1,"Signature":"AQ==","EncryptedDeal":{"DHKey":"","Signature":"","Nonce":"","Cipher":""}}}"#;
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_deal_defaults() {
        let decoded = decode(br#"{"Deal":{}}"#).unwrap();
        assert_eq!(decoded, Message::Deal(Deal::default()));
    }

    #[test]
    fn test_response() {
        let message = Message::Response(Response {
            index: 1,
            response: DealerResponse {
                session_id: vec![],
                index: 0,
                status: false,
                signature: vec![],
            },
        });
        let expected = r#"{"Response":{"Index":1,"Response":{"SessionID":"","Index":0,"Status":false,"Signature":""}}}"#;
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_start_done() {
        let message = Message::StartDone(StartDone {
            public_key: point(),
            session: 0,
        });
        let expected = format!(r#"{{"StartDone":{{"PublicKey":"{POINT}"}}}}"#);
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_decrypt_request() {
        let message = Message::DecryptRequest(DecryptRequest {
            k: point(),
            c: point(),
            ballot_id: "ballot".to_string(),
            session: 0,
        });
        let expected =
            format!(r#"{{"DecryptRequest":{{"K":"{POINT}","C":"{POINT}","BallotId":"ballot"}}}}"#);
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_decrypt_reply() {
        let message = Message::DecryptReply(DecryptReply {
            i: 5,
            v: point(),
            session: 0,
        });
        let expected = format!(r#"{{"DecryptReply":{{"I":5,"V":"{POINT}"}}}}"#);
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        roundtrip(message);
    }

    #[test]
    fn test_get_peer_pub_key() {
        assert_eq!(
            encode(Message::GetPeerPubKey),
            Bytes::from(r#"{"GetPeerPubKey":{}}"#)
        );
        roundtrip(Message::GetPeerPubKey);
        roundtrip(Message::GetPeerPubKeyResp(GetPeerPubKeyResp {
            public_key: point(),
        }));
    }

    #[test]
    fn test_failure() {
        let message = Message::Failure(Failure {
            reason: "not shuffled".to_string(),
            session: 0,
        });
        assert_eq!(
            encode(message.clone()),
            Bytes::from(r#"{"Failure":{"Reason":"not shuffled"}}"#)
        );
        roundtrip(message);
    }

    #[test]
    fn test_session() {
        let message = Message::DecryptReply(DecryptReply {
            i: 2,
            v: point(),
            session: 7,
        });
        let expected = format!(r#"{{"DecryptReply":{{"I":2,"V":"{POINT}","Session":7}}}}"#);
        assert_eq!(encode(message.clone()), Bytes::from(expected));
        assert_eq!(decode(&encode(message.clone())).unwrap().session(), 7);
        roundtrip(message);

        let failure = decode(br#"{"Failure":{"Reason":"aborted","Session":3}}"#).unwrap();
        assert_eq!(failure.session(), 3);
        assert_eq!(Message::GetPeerPubKey.session(), 0);
    }

    #[test]
    fn test_empty() {
        let err = decode(b"{}").unwrap_err();
        assert!(matches!(err, Error::Empty));
        assert_eq!(err.to_string(), "message is empty");
    }

    #[test]
    fn test_ambiguous() {
        let raw = format!(r#"{{"GetPeerPubKey":{{}},"StartDone":{{"PublicKey":"{POINT}"}}}}"#);
        assert!(matches!(
            decode(raw.as_bytes()),
            Err(Error::Ambiguous(2))
        ));
    }

    #[test]
    fn test_invalid_point() {
        // y = p is not a canonical encoding
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0xed;
        bytes[31] = 0x7f;
        let raw = format!(
            r#"{{"StartDone":{{"PublicKey":"{}"}}}}"#,
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
        );
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid Ed25519 curve point"));
    }

    #[test]
    fn test_missing_point() {
        assert!(matches!(
            decode(br#"{"StartDone":{}}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(decode(b"not json"), Err(Error::Json(_))));
    }

    #[test]
    fn test_kind() {
        assert_eq!(Message::GetPeerPubKey.kind(), "GetPeerPubKey");
        assert_eq!(
            Message::Failure(Failure::default()).kind(),
            "Failure"
        );
    }
}
