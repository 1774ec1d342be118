//! State of a handler shared with the actor of the same node.

use crate::{
    primitives::group::{KeyPair, Share},
    wire::encoding,
    Error, Identity,
};
use curve25519_dalek::{EdwardsPoint, Scalar};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Progress of the key generation.
///
/// Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Status {
    Uninitialized,
    Dealing,
    Responding,
    Certified,
    Failed,
}

/// Output of a certified key generation, observed atomically.
#[derive(Clone, Debug)]
pub struct Certified {
    pub participants: Vec<Identity>,
    pub share: Share,
    pub group_public_key: EdwardsPoint,
}

struct Inner {
    key: KeyPair,
    status: Status,
    participants: Vec<Identity>,
    certified: Option<(Share, EdwardsPoint)>,
    failure: Option<String>,
}

/// Handle to the state of a handler.
///
/// The handler writes, any number of readers observe consistent snapshots: the
/// share and the group key become visible together with [Status::Certified].
#[derive(Clone)]
pub struct State {
    inner: Arc<RwLock<Inner>>,
}

impl State {
    pub(crate) fn new(key: KeyPair) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                key,
                status: Status::Uninitialized,
                participants: Vec::new(),
                certified: None,
                failure: None,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> Status {
        self.read().status
    }

    /// Long-term public key of the node.
    pub fn public_key(&self) -> EdwardsPoint {
        *self.read().key.public()
    }

    /// Participants of the key generation, empty until it starts.
    pub fn participants(&self) -> Vec<Identity> {
        self.read().participants.clone()
    }

    /// Group public key, once certified.
    pub fn group_public_key(&self) -> Option<EdwardsPoint> {
        self.read().certified.as_ref().map(|(_, group)| *group)
    }

    /// Private share, once certified.
    pub fn share(&self) -> Option<Share> {
        self.read().certified.as_ref().map(|(share, _)| share.clone())
    }

    /// Output of the key generation, once certified.
    pub fn certified(&self) -> Option<Certified> {
        let inner = self.read();
        let (share, group) = inner.certified.as_ref()?;
        Some(Certified {
            participants: inner.participants.clone(),
            share: share.clone(),
            group_public_key: *group,
        })
    }

    /// Reason the key generation failed, if it did.
    pub fn failure(&self) -> Option<String> {
        self.read().failure.clone()
    }

    pub(crate) fn key(&self) -> KeyPair {
        self.read().key.clone()
    }

    /// Records the participants and enters [Status::Dealing].
    pub(crate) fn start(&self, participants: Vec<Identity>) -> Result<(), Error> {
        let mut inner = self.write();
        if inner.status != Status::Uninitialized {
            return Err(Error::AlreadyStarted);
        }
        inner.participants = participants;
        inner.status = Status::Dealing;
        Ok(())
    }

    /// Enters [Status::Responding].
    pub(crate) fn respond(&self) {
        let mut inner = self.write();
        if inner.status == Status::Dealing {
            inner.status = Status::Responding;
        }
    }

    /// Stores the output of the key generation and enters [Status::Certified].
    pub(crate) fn certify(&self, share: Share, group_public_key: EdwardsPoint) {
        let mut inner = self.write();
        if inner.status >= Status::Certified {
            return;
        }
        inner.certified = Some((share, group_public_key));
        inner.status = Status::Certified;
    }

    /// Enters [Status::Failed], unless already certified.
    pub(crate) fn fail(&self, reason: String) {
        let mut inner = self.write();
        if inner.status >= Status::Certified {
            return;
        }
        inner.failure = Some(reason);
        inner.status = Status::Failed;
    }

    /// Captures everything needed to persist the handler.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();
        Snapshot {
            private_key: *inner.key.private(),
            public_key: *inner.key.public(),
            status: inner.status,
            participants: inner.participants.clone(),
            certificate: inner
                .certified
                .as_ref()
                .map(|(share, group)| Certificate {
                    index: share.index,
                    share: share.private,
                    group_public_key: *group,
                }),
        }
    }

    /// Restores a handle from a snapshot.
    ///
    /// A key generation that was in progress can't be resumed and is restored as
    /// [Status::Failed].
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, Error> {
        let key = KeyPair::from_private(snapshot.private_key);
        if *key.public() != snapshot.public_key {
            return Err(Error::MalformedSnapshot("public key mismatch"));
        }
        let certified = snapshot.certificate.as_ref().map(|certificate| {
            (
                Share {
                    index: certificate.index,
                    private: certificate.share,
                },
                certificate.group_public_key,
            )
        });
        if (snapshot.status == Status::Certified) != certified.is_some() {
            return Err(Error::MalformedSnapshot("certificate does not match status"));
        }
        let (status, failure) = match snapshot.status {
            Status::Dealing | Status::Responding => {
                (Status::Failed, Some("interrupted key generation".to_string()))
            }
            status => (status, None),
        };
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner {
                key,
                status,
                participants: snapshot.participants.clone(),
                certified,
                failure,
            })),
        })
    }
}

/// Private share and group key of a certified handler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Certificate {
    #[serde(rename = "I")]
    pub index: u32,
    #[serde(rename = "V", with = "encoding::scalar")]
    pub share: Scalar,
    #[serde(with = "encoding::point")]
    pub group_public_key: EdwardsPoint,
}

/// Persistable view of a handler.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Snapshot {
    #[serde(with = "encoding::scalar")]
    pub private_key: Scalar,
    #[serde(with = "encoding::point")]
    pub public_key: EdwardsPoint,
    pub status: Status,
    pub participants: Vec<Identity>,
    pub certificate: Option<Certificate>,
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("public_key", &commonware_utils::hex(self.public_key.compress().as_bytes()))
            .field("status", &self.status)
            .field("participants", &self.participants.len())
            .field("certified", &self.certificate.is_some())
            .finish()
    }
}
