use super::{
    machine::{Machine, Outgoing},
    metrics,
    state::{Snapshot, State},
    Config,
};
use crate::{
    p2p::{Receiver, Recipients, Sender},
    wire::{self, Failure, Message},
    Error,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::future::{self, join_all, Either};
use rand::{CryptoRng, Rng};
use std::time::{Duration, SystemTime};
use tracing::{debug, error, warn};

/// Runs the key generation of one node and serves partial decryptions once certified.
pub struct Handler<E: Clock + Spawner + Metrics + Rng + CryptoRng> {
    ////////////////////////////////////////
    // Interfaces
    ////////////////////////////////////////
    context: E,

    ////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////
    /// Maximum time between two messages during a key generation
    response_timeout: Duration,

    ////////////////////////////////////////
    // State
    ////////////////////////////////////////
    machine: Machine,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    metrics: metrics::Metrics,
}

impl<E: Clock + Spawner + Metrics + Rng + CryptoRng> Handler<E> {
    /// Creates a new handler with the given context and configuration.
    /// Returns the handler and a handle to its state.
    pub fn new(context: E, cfg: Config) -> (Self, State) {
        let state = State::new(cfg.key.clone());
        Self::with_state(context, cfg, state)
    }

    /// Creates a handler resuming from `snapshot`, which must hold the key of `cfg`.
    ///
    /// A handler restored from a certified snapshot serves decryption requests with its share.
    pub fn restore(context: E, cfg: Config, snapshot: &Snapshot) -> Result<(Self, State), Error> {
        let state = State::from_snapshot(snapshot)?;
        if state.public_key() != *cfg.key.public() {
            return Err(Error::MalformedSnapshot("key differs from configuration"));
        }
        Ok(Self::with_state(context, cfg, state))
    }

    fn with_state(context: E, cfg: Config, state: State) -> (Self, State) {
        let machine = Machine::new(cfg.address, state.clone(), cfg.guard);
        let metrics = metrics::Metrics::init(context.clone());
        (
            Self {
                context,
                response_timeout: cfg.response_timeout,
                machine,
                metrics,
            },
            state,
        )
    }

    /// Starts the handler.
    ///
    /// Requests and key generation messages are received on `protocol`, replies to actors are
    /// sent on `stream`.
    pub fn start(
        self,
        protocol: (impl Sender, impl Receiver),
        stream: impl Sender,
    ) -> Handle<()> {
        self.context.clone().spawn(|_| self.run(protocol, stream))
    }

    /// Inner run loop called by `start`.
    async fn run(mut self, protocol: (impl Sender, impl Receiver), mut stream: impl Sender) {
        let (mut sender, mut receiver) = protocol;
        let mut deadline: Option<SystemTime> = None;
        loop {
            let timeout = match deadline {
                Some(deadline) if self.machine.awaiting() => {
                    Either::Left(self.context.sleep_until(deadline))
                }
                _ => Either::Right(future::pending::<()>()),
            };

            select! {
                // Peers stopped making progress
                _ = timeout => {
                    deadline = None;
                    let outgoing = self.machine.expire();
                    self.dispatch(&mut sender, &mut stream, outgoing).await;
                },

                // Handle incoming messages
                msg = receiver.recv() => {
                    // Error handling
                    let (from, msg) = match msg {
                        Ok(r) => r,
                        Err(err) => {
                            error!(?err, "receiver failed");
                            return;
                        }
                    };
                    deadline = Some(self.context.current() + self.response_timeout);

                    // Decode
                    let message = match wire::decode(&msg) {
                        Ok(message) => message,
                        Err(err) => {
                            warn!(?err, ?from, "failed to decode message");
                            self.metrics.rejected.inc();
                            continue;
                        }
                    };
                    let kind = message.kind();
                    let session = message.session();
                    let request = matches!(
                        message,
                        Message::Start(_) | Message::DecryptRequest(_) | Message::GetPeerPubKey
                    );

                    // Process
                    match self.machine.on_message(&mut self.context, &from, message) {
                        Ok(outgoing) => {
                            match kind {
                                "Deal" => self.metrics.deals.inc(),
                                "Response" => self.metrics.responses.inc(),
                                "DecryptRequest" => self.metrics.decryptions.inc(),
                                _ => 0,
                            };
                            self.dispatch(&mut sender, &mut stream, outgoing).await;
                        }
                        Err(err) => {
                            warn!(?err, ?from, kind, "rejected message");
                            self.metrics.rejected.inc();
                            if request {
                                let refusal = Outgoing::Reply(
                                    from,
                                    Message::Failure(Failure {
                                        reason: err.to_string(),
                                        session,
                                    }),
                                );
                                self.dispatch(&mut sender, &mut stream, vec![refusal]).await;
                            }
                        }
                    }
                },
            }
        }
    }

    /// Sends `outgoing` and waits for every protocol message to be handed to the transport.
    ///
    /// Replies are sent after protocol messages.
    async fn dispatch(
        &mut self,
        sender: &mut impl Sender,
        stream: &mut impl Sender,
        outgoing: Vec<Outgoing>,
    ) {
        let mut sends = Vec::new();
        let mut replies = Vec::new();
        for out in outgoing {
            match out {
                Outgoing::Protocol(recipients, message) => {
                    let mut sender = sender.clone();
                    sends.push(self.context.with_label("send").spawn(move |_| async move {
                        let kind = message.kind();
                        let expected = match &recipients {
                            Recipients::All => Vec::new(),
                            Recipients::Some(recipients) => recipients.clone(),
                            Recipients::One(recipient) => vec![recipient.clone()],
                        };
                        match sender.send(recipients, wire::encode(message)).await {
                            Ok(sent) => {
                                for recipient in expected.iter().filter(|r| !sent.contains(r)) {
                                    warn!(?recipient, kind, "message not sent");
                                }
                            }
                            Err(err) => warn!(?err, kind, "failed to send message"),
                        }
                    }));
                }
                Outgoing::Reply(to, message) => replies.push((to, message)),
            }
        }
        join_all(sends).await;

        for (to, message) in replies {
            let kind = message.kind();
            match stream
                .send(Recipients::One(to.clone()), wire::encode(message))
                .await
            {
                Ok(sent) if sent.contains(&to) => debug!(?to, kind, "sent reply"),
                Ok(_) => warn!(?to, kind, "reply not sent"),
                Err(err) => error!(?err, ?to, kind, "failed to send reply"),
            }
        }
    }
}
