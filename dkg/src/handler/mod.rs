//! Run the key generation of one node and serve partial decryptions with its share.
//!
//! A [Handler] receives requests and key generation messages on the protocol channel and replies
//! to the requesting actor on the stream channel. Messages may arrive in any order: deals that
//! arrive before `Start` and responses that arrive before every deal was processed are buffered.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --Start--> Dealing --n-1 deals--> Responding --certified--> Certified
//!                              |                       |
//!                              +------timeout----------+--> Failed
//! ```
//!
//! Once [Status::Certified], the handler answers `DecryptRequest`s with `C − v·K` where `v` is
//! its share, optionally only for ciphertexts output by the ballot shuffle ([crate::shuffle]).
//! [Status::Failed] is absorbing: every later request is refused.
//!
//! Requests that are refused (`Start`, `DecryptRequest` and `GetPeerPubKey`) are answered with a
//! `Failure` carrying the reason.

mod config;
mod engine;
mod machine;
mod metrics;
mod state;

pub use config::{Config, RESPONSE_TIMEOUT};
pub use engine::Handler;
pub use machine::{Machine, Outgoing};
pub use state::{Certificate, Certified, Snapshot, State, Status};
