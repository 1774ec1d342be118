//! Send messages between committee members with configurable performance (drops, latency, tampering).
//!
//! # Example
//!
//! ```rust
//! use ballot_dkg::{p2p::{Receiver, Recipients, Sender}, simulated::{Config, Link, Network}, Address};
//! use bytes::Bytes;
//! use commonware_runtime::{deterministic, Metrics, Runner};
//! use std::time::Duration;
//!
//! deterministic::Runner::default().start(|context| async move {
//!     let network = Network::new(context.with_label("network"), Config { max_size: 1024 });
//!     let (a, b) = (Address::from("a"), Address::from("b"));
//!     let (mut sender, _) = network.register(a.clone(), 0).unwrap();
//!     let (_, mut receiver) = network.register(b.clone(), 0).unwrap();
//!     network.add_link(a.clone(), b.clone(), Link::new(Duration::from_millis(10))).unwrap();
//!
//!     sender.send(Recipients::One(b), Bytes::from_static(b"hello")).await.unwrap();
//!     let (from, message) = receiver.recv().await.unwrap();
//!     assert_eq!(from, a);
//!     assert_eq!(message, Bytes::from_static(b"hello"));
//! });
//! ```

mod network;

pub use network::{Config, Link, Network, Receiver, Sender, Tamper};

use thiserror::Error;

/// Errors that can occur when interacting with a [Network].
#[derive(Debug, Error)]
pub enum Error {
    #[error("message too large: {0}")]
    MessageTooLarge(usize),
    #[error("network closed")]
    NetworkClosed,
    #[error("channel already registered: {0}")]
    ChannelAlreadyRegistered(u32),
    #[error("not valid to link self")]
    LinkingSelf,
    #[error("link missing")]
    LinkMissing,
    #[error("invalid success rate (must be in [0, 1]): {0}")]
    InvalidSuccessRate(f64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        p2p::{Receiver as _, Recipients, Sender as _},
        Address,
    };
    use bytes::Bytes;
    use commonware_macros::{select, test_traced};
    use commonware_runtime::{deterministic, Clock, Metrics, Runner};
    use std::{sync::Arc, time::Duration};

    fn config() -> Config {
        Config { max_size: 1024 }
    }

    #[test_traced]
    fn test_ordered_delivery() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let (a, b) = (Address::from("a"), Address::from("b"));
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            let (_, mut receiver) = network.register(b.clone(), 0).unwrap();
            network
                .add_link(a.clone(), b.clone(), Link::new(Duration::from_millis(10)))
                .unwrap();

            for i in 0..10u8 {
                let sent = sender
                    .send(Recipients::One(b.clone()), Bytes::from(vec![i]))
                    .await
                    .unwrap();
                assert_eq!(sent, vec![b.clone()]);
            }
            for i in 0..10u8 {
                let (from, message) = receiver.recv().await.unwrap();
                assert_eq!(from, a);
                assert_eq!(message, Bytes::from(vec![i]));
            }
        });
    }

    #[test_traced]
    fn test_latency() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let (a, b) = (Address::from("a"), Address::from("b"));
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            let (_, mut receiver) = network.register(b.clone(), 0).unwrap();
            network
                .add_link(a.clone(), b.clone(), Link::new(Duration::from_secs(5)))
                .unwrap();

            let start = context.current();
            sender
                .send(Recipients::One(b.clone()), Bytes::from_static(b"late"))
                .await
                .unwrap();
            receiver.recv().await.unwrap();
            let elapsed = context.current().duration_since(start).unwrap();
            assert!(elapsed >= Duration::from_secs(5));
        });
    }

    #[test_traced]
    fn test_loopback() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let a = Address::from("a");
            let (mut sender, mut receiver) = network.register(a.clone(), 0).unwrap();
            let sent = sender
                .send(Recipients::One(a.clone()), Bytes::from_static(b"self"))
                .await
                .unwrap();
            assert_eq!(sent, vec![a.clone()]);
            let (from, message) = receiver.recv().await.unwrap();
            assert_eq!(from, a);
            assert_eq!(message, Bytes::from_static(b"self"));
        });
    }

    #[test_traced]
    fn test_broadcast_all() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let addresses = (0..3)
                .map(|i| Address::from(format!("node-{i}")))
                .collect::<Vec<_>>();
            let mut agents = Vec::new();
            for address in &addresses {
                agents.push(network.register(address.clone(), 0).unwrap());
            }
            network
                .connect_all(&addresses, Link::new(Duration::from_millis(1)))
                .unwrap();

            let sent = agents[0]
                .0
                .send(Recipients::All, Bytes::from_static(b"all"))
                .await
                .unwrap();
            assert_eq!(sent.len(), 3);
            for (_, receiver) in agents.iter_mut() {
                let (from, _) = receiver.recv().await.unwrap();
                assert_eq!(from, addresses[0]);
            }
        });
    }

    #[test_traced]
    fn test_missing_link() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let (a, b) = (Address::from("a"), Address::from("b"));
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            let (_, _receiver) = network.register(b.clone(), 0).unwrap();
            let sent = sender
                .send(Recipients::One(b.clone()), Bytes::from_static(b"lost"))
                .await
                .unwrap();
            assert!(sent.is_empty());

            network.add_link(a.clone(), b.clone(), Link::new(Duration::ZERO)).unwrap();
            network.remove_link(a.clone(), b.clone()).unwrap();
            assert!(matches!(
                network.remove_link(a, b),
                Err(Error::LinkMissing)
            ));
        });
    }

    #[test_traced]
    fn test_dropped_message() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let (a, b) = (Address::from("a"), Address::from("b"));
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            let (_, mut receiver) = network.register(b.clone(), 0).unwrap();
            let link = Link {
                latency: Duration::from_millis(1),
                success_rate: 0.0,
                tamper: None,
            };
            network.add_link(a, b.clone(), link).unwrap();
            sender
                .send(Recipients::One(b), Bytes::from_static(b"dropped"))
                .await
                .unwrap();
            select! {
                _ = receiver.recv() => {
                    panic!("message should have been dropped");
                },
                _ = context.sleep(Duration::from_secs(1)) => {},
            }
        });
    }

    #[test_traced]
    fn test_tamper() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let (a, b) = (Address::from("a"), Address::from("b"));
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            let (_, mut receiver) = network.register(b.clone(), 0).unwrap();
            let tamper: Tamper = Arc::new(|message: Bytes| {
                let mut message = message.to_vec();
                message[0] ^= 1;
                Bytes::from(message)
            });
            let link = Link {
                latency: Duration::from_millis(1),
                success_rate: 1.0,
                tamper: Some(tamper),
            };
            network.add_link(a, b.clone(), link).unwrap();
            sender
                .send(Recipients::One(b), Bytes::from_static(&[0]))
                .await
                .unwrap();
            let (_, message) = receiver.recv().await.unwrap();
            assert_eq!(message, Bytes::from_static(&[1]));
        });
    }

    #[test_traced]
    fn test_invalid_configuration() {
        let executor = deterministic::Runner::default();
        executor.start(|context| async move {
            let network = Network::new(context.with_label("network"), config());
            let a = Address::from("a");
            let (mut sender, _) = network.register(a.clone(), 0).unwrap();
            assert!(matches!(
                network.register(a.clone(), 0),
                Err(Error::ChannelAlreadyRegistered(0))
            ));
            assert!(network.register(a.clone(), 1).is_ok());
            assert!(matches!(
                network.add_link(a.clone(), a.clone(), Link::new(Duration::ZERO)),
                Err(Error::LinkingSelf)
            ));
            let link = Link {
                latency: Duration::ZERO,
                success_rate: 1.5,
                tamper: None,
            };
            assert!(matches!(
                network.add_link(a.clone(), Address::from("b"), link),
                Err(Error::InvalidSuccessRate(_))
            ));
            assert!(matches!(
                sender
                    .send(Recipients::One(a), Bytes::from(vec![0; 2048]))
                    .await,
                Err(Error::MessageTooLarge(2048))
            ));
        });
    }
}
