//! Implementation of a `simulated` network.

use super::Error;
use crate::{
    p2p::{self, Channel, Recipients},
    Address,
};
use bytes::Bytes;
use commonware_runtime::{Clock, Metrics, Spawner};
use futures::{
    channel::mpsc::{self, UnboundedReceiver, UnboundedSender},
    StreamExt,
};
use rand::Rng;
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};
use tracing::{debug, trace};

/// Rewrites a message in flight.
pub type Tamper = Arc<dyn Fn(Bytes) -> Bytes + Send + Sync>;

/// Describes a connection between two addresses.
///
/// Links are unidirectional (and must be set up in both directions
/// for a bidirectional connection).
#[derive(Clone)]
pub struct Link {
    /// Latency for the delivery of a message.
    pub latency: Duration,

    /// Probability of a message being delivered successfully (in range [0,1]).
    pub success_rate: f64,

    /// Applied to every message crossing the link.
    pub tamper: Option<Tamper>,
}

impl Link {
    /// A reliable link with the given latency.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            success_rate: 1.0,
            tamper: None,
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("latency", &self.latency)
            .field("success_rate", &self.success_rate)
            .field("tamper", &self.tamper.is_some())
            .finish()
    }
}

/// Configuration for a `simulated` network.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum size of a message that can be sent over the network.
    pub max_size: usize,
}

struct Delivery {
    channel: Channel,
    message: Bytes,
    at: SystemTime,
}

#[derive(Default)]
struct State {
    agents: BTreeMap<(Address, Channel), UnboundedSender<p2p::Message>>,
    links: BTreeMap<(Address, Address), Link>,
    queues: BTreeMap<(Address, Address), UnboundedSender<Delivery>>,
}

/// In-memory network connecting registered `(address, channel)` pairs.
///
/// Messages crossing a link are delivered after the link latency, in the order they
/// were sent. Messages sent to self are delivered immediately.
#[derive(Clone)]
pub struct Network<E: Spawner + Clock + Metrics + Rng> {
    context: E,
    cfg: Config,
    state: Arc<Mutex<State>>,
}

impl<E: Spawner + Clock + Metrics + Rng> Network<E> {
    /// Create a new simulated network.
    pub fn new(context: E, cfg: Config) -> Self {
        Self {
            context,
            cfg,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Register a new agent on a channel.
    pub fn register(
        &self,
        address: Address,
        channel: Channel,
    ) -> Result<(Sender<E>, Receiver), Error> {
        let mut state = self.state.lock().map_err(|_| Error::NetworkClosed)?;
        let key = (address.clone(), channel);
        if state.agents.contains_key(&key) {
            return Err(Error::ChannelAlreadyRegistered(channel));
        }
        let (inbox, receiver) = mpsc::unbounded();
        state.agents.insert(key, inbox);
        Ok((
            Sender {
                context: self.context.clone(),
                max_size: self.cfg.max_size,
                me: address,
                channel,
                state: self.state.clone(),
            },
            Receiver { inbox: receiver },
        ))
    }

    /// Create a unidirectional link between two addresses.
    ///
    /// An existing link is replaced.
    pub fn add_link(&self, sender: Address, receiver: Address, link: Link) -> Result<(), Error> {
        if sender == receiver {
            return Err(Error::LinkingSelf);
        }
        if !(0.0..=1.0).contains(&link.success_rate) {
            return Err(Error::InvalidSuccessRate(link.success_rate));
        }
        let mut state = self.state.lock().map_err(|_| Error::NetworkClosed)?;
        state.links.insert((sender, receiver), link);
        Ok(())
    }

    /// Remove a unidirectional link between two addresses.
    pub fn remove_link(&self, sender: Address, receiver: Address) -> Result<(), Error> {
        let mut state = self.state.lock().map_err(|_| Error::NetworkClosed)?;
        state
            .links
            .remove(&(sender, receiver))
            .map(|_| ())
            .ok_or(Error::LinkMissing)
    }

    /// Link every pair of distinct addresses in both directions.
    pub fn connect_all(&self, addresses: &[Address], link: Link) -> Result<(), Error> {
        for sender in addresses {
            for receiver in addresses {
                if sender != receiver {
                    self.add_link(sender.clone(), receiver.clone(), link.clone())?;
                }
            }
        }
        Ok(())
    }
}

/// Implementation of a [crate::p2p::Sender] for the simulated network.
#[derive(Clone)]
pub struct Sender<E: Spawner + Clock + Metrics + Rng> {
    context: E,
    max_size: usize,
    me: Address,
    channel: Channel,
    state: Arc<Mutex<State>>,
}

impl<E: Spawner + Clock + Metrics + Rng> fmt::Debug for Sender<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("me", &self.me)
            .field("channel", &self.channel)
            .finish()
    }
}

impl<E: Spawner + Clock + Metrics + Rng> Sender<E> {
    /// Returns the queue of the link from this sender to `recipient`, spawning its delivery task if needed.
    fn queue(&self, state: &mut State, recipient: &Address) -> UnboundedSender<Delivery> {
        let key = (self.me.clone(), recipient.clone());
        if let Some(queue) = state.queues.get(&key) {
            return queue.clone();
        }
        let (queue, mut deliveries) = mpsc::unbounded::<Delivery>();
        state.queues.insert(key, queue.clone());

        let origin = self.me.clone();
        let recipient = recipient.clone();
        let shared = self.state.clone();
        self.context
            .with_label("link")
            .spawn(move |context| async move {
                while let Some(delivery) = deliveries.next().await {
                    context.sleep_until(delivery.at).await;
                    let inbox = match shared.lock() {
                        Ok(state) => state
                            .agents
                            .get(&(recipient.clone(), delivery.channel))
                            .cloned(),
                        Err(_) => return,
                    };
                    let Some(inbox) = inbox else {
                        trace!(?recipient, channel = delivery.channel, "recipient not registered");
                        continue;
                    };
                    if inbox
                        .unbounded_send((origin.clone(), delivery.message))
                        .is_err()
                    {
                        trace!(?recipient, "recipient dropped receiver");
                    }
                }
            });
        queue
    }
}

impl<E: Spawner + Clock + Metrics + Rng> p2p::Sender for Sender<E> {
    type Error = Error;

    async fn send(
        &mut self,
        recipients: Recipients,
        message: Bytes,
    ) -> Result<Vec<Address>, Error> {
        if message.len() > self.max_size {
            return Err(Error::MessageTooLarge(message.len()));
        }

        let state = self.state.clone();
        let mut state = state.lock().map_err(|_| Error::NetworkClosed)?;
        let recipients = match recipients {
            Recipients::All => state
                .agents
                .keys()
                .filter(|(_, channel)| *channel == self.channel)
                .map(|(address, _)| address.clone())
                .collect(),
            Recipients::Some(addresses) => addresses,
            Recipients::One(address) => vec![address],
        };

        let now = self.context.current();
        let mut sent = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            // Loopback
            if recipient == self.me {
                if let Some(inbox) = state.agents.get(&(recipient.clone(), self.channel)) {
                    if inbox
                        .unbounded_send((self.me.clone(), message.clone()))
                        .is_ok()
                    {
                        sent.push(recipient);
                    }
                }
                continue;
            }

            let Some(link) = state.links.get(&(self.me.clone(), recipient.clone())).cloned() else {
                debug!(?recipient, "no link");
                continue;
            };
            if !state
                .agents
                .contains_key(&(recipient.clone(), self.channel))
            {
                debug!(?recipient, channel = self.channel, "recipient not registered");
                continue;
            }
            sent.push(recipient.clone());
            if !self.context.gen_bool(link.success_rate) {
                trace!(?recipient, "dropped message");
                continue;
            }
            let message = match &link.tamper {
                Some(tamper) => tamper(message.clone()),
                None => message.clone(),
            };
            let queue = self.queue(&mut state, &recipient);
            let delivery = Delivery {
                channel: self.channel,
                message,
                at: now + link.latency,
            };
            if queue.unbounded_send(delivery).is_err() {
                return Err(Error::NetworkClosed);
            }
        }
        Ok(sent)
    }
}

/// Implementation of a [crate::p2p::Receiver] for the simulated network.
#[derive(Debug)]
pub struct Receiver {
    inbox: UnboundedReceiver<p2p::Message>,
}

impl p2p::Receiver for Receiver {
    type Error = Error;

    async fn recv(&mut self) -> Result<p2p::Message, Error> {
        self.inbox.next().await.ok_or(Error::NetworkClosed)
    }
}
