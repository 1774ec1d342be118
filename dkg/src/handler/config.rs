use crate::{primitives::group::KeyPair, shuffle::Ballots, Address};
use std::{sync::Arc, time::Duration};

/// Default time to wait for the next key generation message before failing.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the [`Handler`](super::Handler).
#[derive(Clone)]
pub struct Config {
    /// The address of this node.
    pub address: Address,

    /// The long-term key of this node.
    pub key: KeyPair,

    /// Maximum time between two key generation messages once a key generation started.
    pub response_timeout: Duration,

    /// When set, only ciphertexts output by the ballot shuffle are decrypted.
    pub guard: Option<Arc<dyn Ballots>>,
}

impl Config {
    /// Creates a configuration with the default timeout and no shuffle guard.
    pub fn new(address: Address, key: KeyPair) -> Self {
        Self {
            address,
            key,
            response_timeout: RESPONSE_TIMEOUT,
            guard: None,
        }
    }
}
