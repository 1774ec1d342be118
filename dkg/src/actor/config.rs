use crate::{handler::RESPONSE_TIMEOUT, Address};
use std::time::Duration;

/// Default time to wait for every participant to certify.
pub const SETUP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default time to wait for every participant to partially decrypt.
pub const DECRYPT_TIMEOUT: Duration = Duration::from_secs(100);

/// Configuration for the [`Actor`](super::Actor).
#[derive(Clone, Debug)]
pub struct Config {
    /// The address of this node.
    pub address: Address,

    /// Maximum time for the committee to certify after `Start` is sent.
    pub setup_timeout: Duration,

    /// Maximum time for the committee to reply to a decryption request.
    pub decrypt_timeout: Duration,

    /// Maximum time to wait for a public key when discovering peers.
    pub response_timeout: Duration,
}

impl Config {
    /// Creates a configuration with the default timeouts.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            setup_timeout: SETUP_TIMEOUT,
            decrypt_timeout: DECRYPT_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
        }
    }
}
