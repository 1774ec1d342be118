//! Drive the key generation of a committee and decrypt with its key.
//!
//! An [Actor] shares the address of a node running a [crate::handler::Handler]: it sends requests
//! to handlers over the protocol channel and receives their replies on the stream channel.
//!
//! # Setup
//!
//! [Actor::setup] sends `Start` to every member of the committee and waits until each of them
//! reports the same certified group key. A node that did not initiate the key generation can
//! still use its [Actor] once its own handler certified.
//!
//! # Decryption
//!
//! Handlers reply to a decryption request with `C − v·K`, where `v` is their share. These are
//! evaluations of a polynomial whose constant term is the message point `M = C − x·K`, so
//! interpolating any `t` of them at zero yields `M` directly. The [Actor] waits for a reply from
//! every participant before combining and fails if fewer than `t` are valid. Refusals count as
//! invalid shares. A malformed reply, including a partial decryption carrying another
//! participant's index, aborts the decryption.
//!
//! # Sessions
//!
//! Every [Actor::setup] and [Actor::decrypt] draws a fresh session that handlers copy into their
//! replies. Replies of an earlier session (for example, ones that arrived after a timeout) are
//! dropped, so retrying an operation never mixes in stale replies.

mod config;
mod metrics;

pub use config::{Config, DECRYPT_TIMEOUT, SETUP_TIMEOUT};

use crate::{
    byzantine_threshold,
    handler::{State, Status},
    p2p::{Receiver, Recipients, Sender},
    primitives::{elgamal, elgamal::Ciphertext, poly::Eval},
    wire::{self, DecryptRequest, Message, Start},
    Address, Error, Identity,
};
use bytes::Bytes;
use commonware_macros::select;
use commonware_runtime::{Clock, Metrics};
use commonware_utils::hex;
use curve25519_dalek::EdwardsPoint;
use rand::{CryptoRng, Rng};
use std::{
    collections::{BTreeMap, BTreeSet},
    time::{Duration, SystemTime},
};
use tracing::{debug, info, warn};

/// Client of the handlers of a committee.
pub struct Actor<E: Clock + Metrics + Rng + CryptoRng, S: Sender, R: Receiver> {
    context: E,
    address: Address,

    setup_timeout: Duration,
    decrypt_timeout: Duration,
    response_timeout: Duration,

    /// State of the handler of this node.
    state: State,
    sender: S,
    receiver: R,

    setup: Option<(EdwardsPoint, Vec<Identity>)>,
    setup_called: bool,

    metrics: metrics::Metrics,
}

impl<E: Clock + Metrics + Rng + CryptoRng, S: Sender, R: Receiver> Actor<E, S, R> {
    /// Creates an actor sending requests with `network.0` and receiving replies on `network.1`.
    pub fn new(context: E, cfg: Config, state: State, network: (S, R)) -> Self {
        let metrics = metrics::Metrics::init(context.clone());
        Self {
            context,
            address: cfg.address,
            setup_timeout: cfg.setup_timeout,
            decrypt_timeout: cfg.decrypt_timeout,
            response_timeout: cfg.response_timeout,
            state,
            sender: network.0,
            receiver: network.1,
            setup: None,
            setup_called: false,
            metrics,
        }
    }

    /// Asks every address for its long-term public key.
    ///
    /// Returns the identities in the order of `addresses`.
    pub async fn discover(&mut self, addresses: &[Address]) -> Result<Vec<Identity>, Error> {
        self.send(addresses, Message::GetPeerPubKey).await?;
        let mut keys = BTreeMap::new();
        while keys.len() < addresses.len() {
            let deadline = self.context.current() + self.response_timeout;
            let (from, msg) = self.recv(deadline).await?;
            if !addresses.contains(&from) {
                debug!(?from, "ignoring reply from unknown address");
                continue;
            }
            let Ok(message) = wire::decode(&msg) else {
                return Err(Error::MalformedReply(from));
            };

            // Key requests carry no session
            if message.session() != 0 {
                debug!(?from, kind = message.kind(), "ignoring stale reply");
                continue;
            }
            match message {
                Message::GetPeerPubKeyResp(resp) => {
                    keys.insert(from, resp.public_key);
                }
                Message::Failure(failure) => return Err(Error::Refused(from, failure.reason)),
                message => return Err(Error::UnexpectedMessage(message.kind())),
            }
        }
        Ok(addresses
            .iter()
            .filter_map(|address| {
                keys.get(address).map(|public_key| Identity {
                    address: address.clone(),
                    public_key: *public_key,
                })
            })
            .collect())
    }

    /// Starts a key generation among `committee` and returns the certified group key.
    ///
    /// Can only be called once, and only while the handler of this node has not started a key
    /// generation.
    pub async fn setup(&mut self, committee: &[Identity]) -> Result<EdwardsPoint, Error> {
        if self.setup_called || self.state.status() != Status::Uninitialized {
            return Err(Error::AlreadySetUp);
        }
        self.setup_called = true;

        let session = self.session();
        let addresses: Vec<Address> = committee.iter().map(|i| i.address.clone()).collect();
        let start = Start {
            addresses: addresses.clone(),
            public_keys: committee.iter().map(|i| i.public_key).collect(),
            session,
        };
        self.send(&addresses, Message::Start(start)).await?;
        info!(me = ?self.address, n = committee.len(), "sent start");

        // Every participant must report the same key
        let deadline = self.context.current() + self.setup_timeout;
        let mut group: Option<EdwardsPoint> = None;
        let mut done = BTreeSet::new();
        while done.len() < addresses.len() {
            let (from, msg) = self.recv(deadline).await?;
            if !addresses.contains(&from) {
                debug!(?from, "ignoring reply from non-participant");
                continue;
            }
            let Ok(message) = wire::decode(&msg) else {
                return Err(Error::MalformedReply(from));
            };
            if message.session() != session {
                debug!(?from, kind = message.kind(), "ignoring stale reply");
                continue;
            }
            let public_key = match message {
                Message::StartDone(start_done) => start_done.public_key,
                Message::Failure(failure) => return Err(Error::Refused(from, failure.reason)),
                message => return Err(Error::UnexpectedMessage(message.kind())),
            };
            if !done.insert(from.clone()) {
                warn!(?from, "duplicate start done");
                continue;
            }
            match group {
                Some(group) if group != public_key => {
                    warn!(
                        ?from,
                        expected = %hex(group.compress().as_bytes()),
                        received = %hex(public_key.compress().as_bytes()),
                        "inconsistent group key"
                    );
                    return Err(Error::InconsistentGroupKey);
                }
                Some(_) => {}
                None => group = Some(public_key),
            }
            debug!(?from, done = done.len(), "participant certified");
        }
        let group = group.ok_or(Error::MalformedStart("no participants"))?;
        info!(public = %hex(group.compress().as_bytes()), "committee certified");
        self.metrics.setups.inc();
        self.setup = Some((group, committee.to_vec()));
        Ok(group)
    }

    /// Returns the group key and participants, once the committee certified.
    fn committee(&self) -> Option<(EdwardsPoint, Vec<Identity>)> {
        match self.state.certified() {
            Some(certified) => Some((certified.group_public_key, certified.participants)),
            None => self.setup.clone(),
        }
    }

    /// Returns the certified group key.
    pub fn group_public_key(&self) -> Result<EdwardsPoint, Error> {
        self.committee()
            .map(|(group, _)| group)
            .ok_or(Error::NotInitialized)
    }

    /// Encrypts the longest embeddable prefix of `msg` to the group key.
    ///
    /// Returns the ciphertext and the bytes that did not fit.
    pub fn encrypt(&mut self, msg: &[u8]) -> Result<(Ciphertext, Vec<u8>), Error> {
        let group = self.group_public_key()?;
        Ok(elgamal::encrypt(&mut self.context, &group, msg))
    }

    /// Decrypts `ciphertext` with the help of the committee.
    ///
    /// `ballot_id` names the ballot whose shuffle output guarded handlers consult.
    pub async fn decrypt(
        &mut self,
        ciphertext: &Ciphertext,
        ballot_id: &str,
    ) -> Result<Vec<u8>, Error> {
        let (_, participants) = self.committee().ok_or(Error::NotInitialized)?;
        let threshold = byzantine_threshold(participants.len() as u32);
        let addresses: Vec<Address> = participants.iter().map(|i| i.address.clone()).collect();
        let session = self.session();
        let request = DecryptRequest {
            k: ciphertext.k,
            c: ciphertext.c,
            ballot_id: ballot_id.to_string(),
            session,
        };
        self.send(&addresses, Message::DecryptRequest(request))
            .await?;

        // Wait for every participant
        let deadline = self.context.current() + self.decrypt_timeout;
        let mut replied = BTreeSet::new();
        let mut partials = BTreeMap::new();
        while replied.len() < addresses.len() {
            let (from, msg) = self.recv(deadline).await?;
            let Some(index) = addresses.iter().position(|address| *address == from) else {
                debug!(?from, "ignoring reply from non-participant");
                continue;
            };
            let Ok(message) = wire::decode(&msg) else {
                return Err(Error::DecryptFailed("malformed reply"));
            };
            if message.session() != session {
                debug!(?from, kind = message.kind(), "ignoring stale reply");
                continue;
            }
            if !replied.insert(from.clone()) {
                warn!(?from, "duplicate reply");
                continue;
            }
            match message {
                Message::DecryptReply(reply) => {
                    if reply.i != index as i64 {
                        warn!(?from, index, received = reply.i, "mismatched share index");
                        return Err(Error::DecryptFailed("mismatched share index"));
                    }
                    let index = index as u32;
                    partials.insert(
                        index,
                        Eval {
                            index,
                            value: reply.v,
                        },
                    );
                }
                Message::Failure(failure) => {
                    warn!(?from, reason = %failure.reason, "partial decryption refused");
                }
                _ => return Err(Error::DecryptFailed("unexpected reply")),
            }
        }
        if (partials.len() as u32) < threshold {
            return Err(Error::InsufficientShares(partials.len(), threshold));
        }

        // Interpolation yields the message point
        let message = elgamal::combine(threshold, partials.values())
            .map_err(|_| Error::DecryptFailed("couldn't combine partial decryptions"))?;
        let data = elgamal::data(&message)
            .map_err(|_| Error::DecryptFailed("invalid embedding"))?;
        debug!(ballot = ballot_id, valid = partials.len(), "decrypted");
        self.metrics.decryptions.inc();
        Ok(data)
    }

    /// Redistributes the shares of the committee.
    ///
    /// Resharing is not supported and the committee keeps its shares.
    pub fn reshare(&mut self) -> Result<(), Error> {
        debug!("reshare requested");
        Ok(())
    }

    /// Draws the session of a new operation.
    fn session(&mut self) -> u64 {
        self.context.gen_range(1..=u64::MAX)
    }

    /// Sends `message` to every address, failing if any of them can't be reached.
    async fn send(&mut self, addresses: &[Address], message: Message) -> Result<(), Error> {
        let sent = self
            .sender
            .send(Recipients::Some(addresses.to_vec()), wire::encode(message))
            .await
            .map_err(|err| Error::Transport(err.to_string()))?;
        if let Some(missing) = addresses.iter().find(|address| !sent.contains(address)) {
            return Err(Error::SendFailed(missing.clone()));
        }
        Ok(())
    }

    /// Receives the next reply, failing once `deadline` is reached.
    async fn recv(&mut self, deadline: SystemTime) -> Result<(Address, Bytes), Error> {
        select! {
            _ = self.context.sleep_until(deadline) => {
                Err(Error::Timeout)
            },
            msg = self.receiver.recv() => {
                msg.map_err(|err| Error::Transport(err.to_string()))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        handler::{self, Handler, Status},
        primitives::group::KeyPair,
        shuffle::{Ballots, MemoryBallots, ShuffleInstance},
        simulated::{self, Link, Network, Tamper},
        wire::StartDone,
        PROTOCOL_CHANNEL, STREAM_CHANNEL,
    };
    use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
    use commonware_macros::test_traced;
    use commonware_runtime::{deterministic, Metrics as _, Runner};
    use std::sync::Arc;

    type TestActor = Actor<
        deterministic::Context,
        simulated::Sender<deterministic::Context>,
        simulated::Receiver,
    >;

    const LATENCY: Duration = Duration::from_millis(10);

    struct Node {
        identity: Identity,
        state: State,
        actor: TestActor,
    }

    fn address(i: usize) -> Address {
        Address::from(format!("node-{i}"))
    }

    /// Registers a node, starting its handler when `run` is set.
    fn node(
        context: &deterministic::Context,
        network: &Network<deterministic::Context>,
        i: usize,
        guard: Option<Arc<dyn Ballots>>,
        run: bool,
    ) -> Node {
        let key = KeyPair::generate(&mut context.clone());
        let identity = Identity {
            address: address(i),
            public_key: *key.public(),
        };
        let (protocol_sender, protocol_receiver) = network
            .register(identity.address.clone(), PROTOCOL_CHANNEL)
            .unwrap();
        let (stream_sender, stream_receiver) = network
            .register(identity.address.clone(), STREAM_CHANNEL)
            .unwrap();

        let mut cfg = handler::Config::new(identity.address.clone(), key);
        cfg.guard = guard;
        let (handler, state) = Handler::new(context.with_label(&format!("handler_{i}")), cfg);
        if run {
            handler.start(
                (protocol_sender.clone(), protocol_receiver),
                stream_sender,
            );
        }
        let actor = Actor::new(
            context.with_label(&format!("actor_{i}")),
            Config::new(identity.address.clone()),
            state.clone(),
            (protocol_sender, stream_receiver),
        );
        Node {
            identity,
            state,
            actor,
        }
    }

    fn committee(
        context: &deterministic::Context,
        n: usize,
        guard: impl Fn(usize) -> Option<Arc<dyn Ballots>>,
    ) -> (Network<deterministic::Context>, Vec<Node>) {
        let network = Network::new(
            context.with_label("network"),
            simulated::Config { max_size: 1024 * 1024 },
        );
        let nodes: Vec<Node> = (0..n)
            .map(|i| node(context, &network, i, guard(i), true))
            .collect();
        let addresses: Vec<Address> = nodes.iter().map(|n| n.identity.address.clone()).collect();
        network.connect_all(&addresses, Link::new(LATENCY)).unwrap();
        (network, nodes)
    }

    fn identities(nodes: &[Node]) -> Vec<Identity> {
        nodes.iter().map(|n| n.identity.clone()).collect()
    }

    #[test_traced]
    fn test_setup() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 5, |_| None);
            let addresses: Vec<Address> = nodes.iter().map(|n| n.identity.address.clone()).collect();

            // Discover the committee from its addresses
            let committee = nodes[0].actor.discover(&addresses).await.unwrap();
            assert_eq!(committee, identities(&nodes));

            let group = nodes[0].actor.setup(&committee).await.unwrap();
            assert_eq!(nodes[0].actor.group_public_key().unwrap(), group);
            for (i, node) in nodes.iter().enumerate() {
                assert_eq!(node.state.status(), Status::Certified);
                assert_eq!(node.state.group_public_key(), Some(group));
                assert_eq!(node.state.share().unwrap().index, i as u32);
                assert_eq!(node.state.participants(), committee);
            }
        });
    }

    #[test_traced]
    fn test_encrypt_decrypt_across_nodes() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 5, |_| None);
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();

            // Any certified node can encrypt and decrypt
            let (ciphertext, remainder) = nodes[2].actor.encrypt(b"Hello world").unwrap();
            assert!(remainder.is_empty());
            let plaintext = nodes[4].actor.decrypt(&ciphertext, "ballot").await.unwrap();
            assert_eq!(plaintext, b"Hello world");
        });
    }

    #[test_traced]
    fn test_encrypt_remainder() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 4, |_| None);
            let committee = identities(&nodes);
            nodes[1].actor.setup(&committee).await.unwrap();

            let msg = [7u8; 40];
            let (ciphertext, remainder) = nodes[1].actor.encrypt(&msg).unwrap();
            assert_eq!(remainder, msg[elgamal::EMBED_LEN..]);
            let plaintext = nodes[3].actor.decrypt(&ciphertext, "").await.unwrap();
            assert_eq!(plaintext, msg[..elgamal::EMBED_LEN]);
        });
    }

    #[test_traced]
    fn test_setup_twice() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 3, |_| None);
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();
            assert!(matches!(
                nodes[0].actor.setup(&committee).await,
                Err(Error::AlreadySetUp)
            ));
        });
    }

    #[test_traced]
    fn test_setup_after_peer_initiated() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 3, |_| None);
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();

            // The handler of node 1 already certified
            assert_eq!(nodes[1].state.status(), Status::Certified);
            assert!(matches!(
                nodes[1].actor.setup(&committee).await,
                Err(Error::AlreadySetUp)
            ));
        });
    }

    #[test_traced]
    fn test_decrypt_after_timeout() {
        let executor = deterministic::Runner::timed(Duration::from_secs(600));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 4, |_| None);
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();

            // Node 1 answers after the deadline
            network
                .add_link(address(1), address(0), Link::new(Duration::from_secs(150)))
                .unwrap();
            let (first, _) = nodes[0].actor.encrypt(b"first").unwrap();
            assert!(matches!(
                nodes[0].actor.decrypt(&first, "").await,
                Err(Error::Timeout)
            ));

            // The late reply is queued by the time the next decryption starts
            context.sleep(Duration::from_secs(60)).await;
            network
                .add_link(address(1), address(0), Link::new(LATENCY))
                .unwrap();
            let (second, _) = nodes[0].actor.encrypt(b"second").unwrap();
            let plaintext = nodes[0].actor.decrypt(&second, "").await.unwrap();
            assert_eq!(plaintext, b"second");
        });
    }

    #[test_traced]
    fn test_mismatched_share_index() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 4, |_| None);
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();

            // Node 2 claims the share of node 3
            let tamper: Tamper = Arc::new(|message: Bytes| match wire::decode(&message) {
                Ok(Message::DecryptReply(reply)) => {
                    wire::encode(Message::DecryptReply(wire::DecryptReply { i: 3, ..reply }))
                }
                _ => message,
            });
            let link = Link {
                latency: LATENCY,
                success_rate: 1.0,
                tamper: Some(tamper),
            };
            network.add_link(address(2), address(0), link).unwrap();

            let (ciphertext, _) = nodes[0].actor.encrypt(b"index").unwrap();
            assert!(matches!(
                nodes[0].actor.decrypt(&ciphertext, "").await,
                Err(Error::DecryptFailed("mismatched share index"))
            ));
        });
    }

    #[test_traced]
    fn test_single_participant() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 1, |_| None);
            let committee = identities(&nodes);
            let group = nodes[0].actor.setup(&committee).await.unwrap();
            assert_eq!(nodes[0].state.group_public_key(), Some(group));

            let (ciphertext, _) = nodes[0].actor.encrypt(b"alone").unwrap();
            let plaintext = nodes[0].actor.decrypt(&ciphertext, "").await.unwrap();
            assert_eq!(plaintext, b"alone");
        });
    }

    #[test_traced]
    fn test_not_initialized() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 3, |_| None);
            assert!(matches!(
                nodes[0].actor.group_public_key(),
                Err(Error::NotInitialized)
            ));
            assert!(matches!(
                nodes[0].actor.encrypt(b"early"),
                Err(Error::NotInitialized)
            ));
            let ciphertext = Ciphertext {
                k: ED25519_BASEPOINT_POINT,
                c: ED25519_BASEPOINT_POINT,
            };
            assert!(matches!(
                nodes[0].actor.decrypt(&ciphertext, "").await,
                Err(Error::NotInitialized)
            ));
            nodes[0].actor.reshare().unwrap();
        });
    }

    #[test_traced]
    fn test_tampered_group_key() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 5, |_| None);
            let committee = identities(&nodes);

            // Node 3 reports a different key to the initiator
            let tamper: Tamper = Arc::new(|message: Bytes| match wire::decode(&message) {
                Ok(Message::StartDone(done)) => wire::encode(Message::StartDone(StartDone {
                    public_key: done.public_key + ED25519_BASEPOINT_POINT,
                    ..done
                })),
                _ => message,
            });
            let link = Link {
                latency: LATENCY,
                success_rate: 1.0,
                tamper: Some(tamper),
            };
            network.add_link(address(3), address(0), link).unwrap();

            assert!(matches!(
                nodes[0].actor.setup(&committee).await,
                Err(Error::InconsistentGroupKey)
            ));

            // Start done replies still in flight don't disturb the next decryption
            while nodes[0].state.status() != Status::Certified {
                context.sleep(LATENCY).await;
            }
            let (ciphertext, _) = nodes[0].actor.encrypt(b"after setup").unwrap();
            let plaintext = nodes[0].actor.decrypt(&ciphertext, "").await.unwrap();
            assert_eq!(plaintext, b"after setup");
        });
    }

    #[test_traced]
    fn test_shuffle_guard() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let ballots = MemoryBallots::default();
            let guard: Arc<dyn Ballots> = Arc::new(ballots.clone());
            let (_, mut nodes) = committee(&context, 4, |_| Some(guard.clone()));
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();
            let (ciphertext, _) = nodes[0].actor.encrypt(b"vote").unwrap();

            // Every handler refuses a ciphertext that was not shuffled
            assert!(matches!(
                nodes[1].actor.decrypt(&ciphertext, "ballot").await,
                Err(Error::InsufficientShares(0, 3))
            ));

            // Once shuffled, the ciphertext can be decrypted
            ballots.push_instance(
                "ballot",
                1,
                ShuffleInstance {
                    shuffled_ballots: vec![ciphertext],
                },
            );
            let plaintext = nodes[1].actor.decrypt(&ciphertext, "ballot").await.unwrap();
            assert_eq!(plaintext, b"vote");
        });
    }

    #[test_traced]
    fn test_refusing_minority() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            // Only node 4 checks the shuffle, the ballot is unknown to it
            let guard: Arc<dyn Ballots> = Arc::new(MemoryBallots::default());
            let (_, mut nodes) = committee(&context, 5, |i| (i == 4).then(|| guard.clone()));
            let committee = identities(&nodes);
            nodes[0].actor.setup(&committee).await.unwrap();
            let (ciphertext, _) = nodes[0].actor.encrypt(b"four of five").unwrap();
            let plaintext = nodes[0].actor.decrypt(&ciphertext, "ballot").await.unwrap();
            assert_eq!(plaintext, b"four of five");
        });
    }

    #[test_traced]
    fn test_delayed_start() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 5, |_| None);
            let committee = identities(&nodes);

            // Node 4 receives deals from its peers before its start
            network
                .add_link(address(0), address(4), Link::new(Duration::from_millis(500)))
                .unwrap();

            let group = nodes[0].actor.setup(&committee).await.unwrap();
            for node in &nodes {
                assert_eq!(node.state.group_public_key(), Some(group));
            }
        });
    }

    #[test_traced]
    fn test_malformed_start_refused() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 3, |_| None);
            let mut committee = identities(&nodes);
            committee[1].public_key = *KeyPair::generate(&mut context.clone()).public();

            let result = nodes[0].actor.setup(&committee).await;
            assert!(matches!(
                result,
                Err(Error::Refused(from, reason))
                    if from == address(1) && reason == "malformed start: own public key mismatch"
            ));
            assert_eq!(nodes[1].state.status(), Status::Uninitialized);
        });
    }

    #[test_traced]
    fn test_unreachable_participant() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (_, mut nodes) = committee(&context, 2, |_| None);
            let mut committee = identities(&nodes);
            committee.push(Identity {
                address: Address::from("stranger"),
                public_key: *KeyPair::generate(&mut context.clone()).public(),
            });
            assert!(matches!(
                nodes[0].actor.setup(&committee).await,
                Err(Error::SendFailed(address)) if address == Address::from("stranger")
            ));
        });
    }

    #[test_traced]
    fn test_certification_timeout() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 2, |_| None);

            // Node 2 is reachable but never runs its handler
            let silent = node(&context, &network, 2, None, false);
            for i in 0..2 {
                network.add_link(address(i), address(2), Link::new(LATENCY)).unwrap();
                network.add_link(address(2), address(i), Link::new(LATENCY)).unwrap();
            }
            let mut committee = identities(&nodes);
            committee.push(silent.identity.clone());

            let start = context.current();
            let (from, reason) = match nodes[0].actor.setup(&committee).await {
                Err(Error::Refused(from, reason)) => (from, reason),
                result => panic!("unexpected result: {result:?}"),
            };
            assert_eq!(reason, "certification timeout");
            assert!(context.current().duration_since(start).unwrap() >= handler::RESPONSE_TIMEOUT);
            let index = committee.iter().position(|i| i.address == from).unwrap();
            assert_eq!(nodes[index].state.status(), Status::Failed);
            assert_eq!(
                nodes[index].state.failure().as_deref(),
                Some("certification timeout")
            );
        });
    }

    #[test_traced]
    fn test_setup_timeout() {
        let executor = deterministic::Runner::timed(Duration::from_secs(60));
        executor.start(|context| async move {
            let (network, mut nodes) = committee(&context, 3, |_| None);
            let committee = identities(&nodes);

            // Node 1 never hears from the initiator
            let link = Link {
                latency: LATENCY,
                success_rate: 0.0,
                tamper: None,
            };
            network.add_link(address(0), address(1), link).unwrap();

            let mut cfg = Config::new(address(0));
            cfg.setup_timeout = Duration::from_secs(5);
            let Node { state, actor, .. } = nodes.remove(0);
            let mut actor = Actor::new(
                context.with_label("impatient"),
                cfg,
                state,
                (actor.sender, actor.receiver),
            );
            assert!(matches!(actor.setup(&committee).await, Err(Error::Timeout)));
        });
    }

    #[test]
    fn test_determinism() {
        let run = |seed: u64| {
            deterministic::Runner::seeded(seed).start(|context| async move {
                let (_, mut nodes) = committee(&context, 4, |_| None);
                let committee = identities(&nodes);
                let group = nodes[0].actor.setup(&committee).await.unwrap();
                (group.compress().to_bytes(), context.current())
            })
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42).0, run(43).0);
    }
}
