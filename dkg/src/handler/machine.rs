//! Key generation and decryption state machine of a handler.

use super::state::{State, Status};
use crate::{
    byzantine_threshold,
    p2p::Recipients,
    pedersen::{
        self,
        types::{Deal, Response},
        Generator,
    },
    primitives::elgamal,
    shuffle::{self, Ballots},
    wire::{DecryptReply, DecryptRequest, Failure, GetPeerPubKeyResp, Message, Start, StartDone},
    Address, Error, Identity,
};
use commonware_utils::hex;
use curve25519_dalek::traits::IsIdentity;
use rand::{CryptoRng, RngCore};
use std::{collections::BTreeSet, mem, sync::Arc};
use tracing::{debug, info, warn};

/// A message produced by the [Machine].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outgoing {
    /// Sent to handlers over the protocol channel.
    Protocol(Recipients, Message),
    /// Sent to an actor over the stream channel.
    Reply(Address, Message),
}

/// Processes the messages received by a handler, in any order.
///
/// Deals received before `Start` and responses received before every deal was processed are
/// buffered and replayed once they can be handled.
pub struct Machine {
    address: Address,
    state: State,
    guard: Option<Arc<dyn Ballots>>,

    generator: Option<Generator>,
    participants: Vec<Identity>,
    initiator: Option<Address>,
    /// Session of the `Start` received from the initiator.
    session: u64,
    processed: u32,

    pending_deals: Vec<(Address, Deal)>,
    pending_responses: Vec<(Address, Response)>,
}

impl Machine {
    pub fn new(address: Address, state: State, guard: Option<Arc<dyn Ballots>>) -> Self {
        Self {
            address,
            state,
            guard,
            generator: None,
            participants: Vec::new(),
            initiator: None,
            session: 0,
            processed: 0,
            pending_deals: Vec::new(),
            pending_responses: Vec::new(),
        }
    }

    /// Returns whether a key generation is in progress.
    pub fn awaiting(&self) -> bool {
        matches!(self.state.status(), Status::Dealing | Status::Responding)
    }

    /// Handles `message` received from `from` and returns the messages to send.
    pub fn on_message<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        from: &Address,
        message: Message,
    ) -> Result<Vec<Outgoing>, Error> {
        match (self.state.status(), message) {
            (Status::Failed, _) => Err(Error::Aborted),
            (_, Message::GetPeerPubKey) => Ok(vec![Outgoing::Reply(
                from.clone(),
                Message::GetPeerPubKeyResp(GetPeerPubKeyResp {
                    public_key: self.state.public_key(),
                }),
            )]),
            (Status::Uninitialized, Message::Start(start)) => self.start(rng, from, start),
            (_, Message::Start(_)) => Err(Error::AlreadyStarted),
            (Status::Uninitialized, Message::Deal(deal)) => {
                debug!(?from, dealer = deal.index, "buffering deal");
                self.pending_deals.push((from.clone(), deal));
                Ok(Vec::new())
            }
            (Status::Uninitialized | Status::Dealing, Message::Response(response)) => {
                debug!(
                    ?from,
                    dealer = response.index,
                    verifier = response.response.index,
                    "buffering response"
                );
                self.pending_responses.push((from.clone(), response));
                Ok(Vec::new())
            }
            (Status::Dealing, Message::Deal(deal)) => {
                let outgoing = self.deal(from, deal)?;
                self.progress(outgoing)
            }
            (Status::Responding, Message::Response(response)) => {
                self.response(from, response)?;
                self.progress(Vec::new())
            }
            (Status::Certified, Message::Deal(_) | Message::Response(_)) => {
                debug!(?from, "ignoring key generation message after certification");
                Ok(Vec::new())
            }
            (Status::Certified, Message::DecryptRequest(request)) => self.decrypt(from, request),
            (_, Message::DecryptRequest(_)) => Err(Error::NotInitialized),
            (_, message) => Err(Error::UnexpectedMessage(message.kind())),
        }
    }

    /// Fails the key generation after peers stopped making progress.
    ///
    /// Returns the refusal to report to the initiator.
    pub fn expire(&mut self) -> Vec<Outgoing> {
        let reason = Error::CertificationTimeout.to_string();
        warn!(status = ?self.state.status(), processed = self.processed, "key generation expired");
        self.state.fail(reason.clone());
        self.refuse(reason)
    }

    fn refuse(&self, reason: String) -> Vec<Outgoing> {
        self.initiator
            .iter()
            .map(|initiator| {
                Outgoing::Reply(
                    initiator.clone(),
                    Message::Failure(Failure {
                        reason: reason.clone(),
                        session: self.session,
                    }),
                )
            })
            .collect()
    }

    fn start<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        from: &Address,
        start: Start,
    ) -> Result<Vec<Outgoing>, Error> {
        // Validate participants
        let n = start.addresses.len();
        if n == 0 {
            return Err(Error::MalformedStart("no participants"));
        }
        if n != start.public_keys.len() {
            return Err(Error::MalformedStart("addresses and public keys differ in length"));
        }
        let addresses: BTreeSet<_> = start.addresses.iter().collect();
        if addresses.len() != n {
            return Err(Error::MalformedStart("duplicate address"));
        }
        let keys: BTreeSet<_> = start.public_keys.iter().map(|p| p.compress().to_bytes()).collect();
        if keys.len() != n {
            return Err(Error::MalformedStart("duplicate public key"));
        }
        let key = self.state.key();
        let me = start
            .addresses
            .iter()
            .position(|address| *address == self.address)
            .ok_or(Error::MalformedStart("missing own address"))?;
        if start.public_keys[me] != *key.public() {
            return Err(Error::MalformedStart("own public key mismatch"));
        }

        // Deal to every other participant
        let threshold = byzantine_threshold(n as u32);
        let generator = Generator::new(rng, key, start.public_keys.clone(), threshold)?;
        let deals = generator.deals(rng)?;
        let participants: Vec<Identity> = start
            .addresses
            .into_iter()
            .zip(start.public_keys)
            .map(|(address, public_key)| Identity {
                address,
                public_key,
            })
            .collect();
        self.state.start(participants.clone())?;
        info!(?from, index = me, n, threshold, "starting key generation");
        let mut outgoing: Vec<Outgoing> = deals
            .into_iter()
            .map(|(verifier, deal)| {
                Outgoing::Protocol(
                    Recipients::One(participants[verifier as usize].address.clone()),
                    Message::Deal(deal),
                )
            })
            .collect();
        self.generator = Some(generator);
        self.participants = participants;
        self.initiator = Some(from.clone());
        self.session = start.session;

        // Replay deals received early
        for (from, deal) in mem::take(&mut self.pending_deals) {
            match self.deal(&from, deal) {
                Ok(responses) => outgoing.extend(responses),
                Err(err) => warn!(?from, ?err, "dropping buffered deal"),
            }
        }
        self.progress(outgoing)
    }

    /// Returns whether `from` is the participant at `index`.
    fn is_participant(&self, from: &Address, index: u32) -> bool {
        self.participants
            .get(index as usize)
            .is_some_and(|participant| participant.address == *from)
    }

    fn deal(&mut self, from: &Address, deal: Deal) -> Result<Vec<Outgoing>, Error> {
        if !self.is_participant(from, deal.index) {
            return Err(pedersen::Error::InvalidDealer(deal.index).into());
        }
        let generator = self.generator.as_mut().ok_or(Error::NotInitialized)?;
        let response = generator.process_deal(&deal)?;
        self.processed += 1;
        debug!(
            dealer = deal.index,
            status = response.response.status,
            processed = self.processed,
            "processed deal"
        );

        // Every other participant learns our verdict
        let peers = self
            .participants
            .iter()
            .filter(|participant| participant.address != self.address)
            .map(|participant| participant.address.clone())
            .collect();
        Ok(vec![Outgoing::Protocol(
            Recipients::Some(peers),
            Message::Response(response),
        )])
    }

    fn response(&mut self, from: &Address, response: Response) -> Result<(), Error> {
        let verifier = response.response.index;
        if !self.is_participant(from, verifier) {
            return Err(pedersen::Error::InvalidVerifier(verifier).into());
        }
        let generator = self.generator.as_mut().ok_or(Error::NotInitialized)?;
        generator.process_response(&response)?;
        debug!(dealer = response.index, verifier, "processed response");
        Ok(())
    }

    /// Moves to the next status once its condition holds.
    fn progress(&mut self, mut outgoing: Vec<Outgoing>) -> Result<Vec<Outgoing>, Error> {
        if self.state.status() == Status::Dealing
            && self.processed + 1 == self.participants.len() as u32
        {
            self.state.respond();
            debug!("processed all deals");
            for (from, response) in mem::take(&mut self.pending_responses) {
                if let Err(err) = self.response(&from, response) {
                    warn!(?from, ?err, "dropping buffered response");
                }
            }
        }
        if self.state.status() != Status::Responding {
            return Ok(outgoing);
        }
        let Some(generator) = &self.generator else {
            return Ok(outgoing);
        };
        if !generator.certified() {
            return Ok(outgoing);
        }

        // Certify
        match generator.finalize() {
            Ok(output) => {
                let group = *output.public.constant();
                info!(
                    qualified = ?output.qualified,
                    public = %hex(group.compress().as_bytes()),
                    "certified"
                );
                self.state.certify(output.share, group);
                if let Some(initiator) = &self.initiator {
                    outgoing.push(Outgoing::Reply(
                        initiator.clone(),
                        Message::StartDone(StartDone {
                            public_key: group,
                            session: self.session,
                        }),
                    ));
                }
            }
            Err(err) => {
                warn!(?err, "key generation failed");
                self.state.fail(err.to_string());
                outgoing.extend(self.refuse(err.to_string()));
            }
        }
        Ok(outgoing)
    }

    fn decrypt(&self, from: &Address, request: DecryptRequest) -> Result<Vec<Outgoing>, Error> {
        let ciphertext = request.ciphertext();
        if ciphertext.k.is_identity() {
            return Err(Error::InvalidCiphertext);
        }
        if let Some(guard) = &self.guard {
            shuffle::check(guard.as_ref(), &request.ballot_id, &ciphertext)?;
        }
        let share = self.state.share().ok_or(Error::NotInitialized)?;
        let partial = elgamal::partial_decrypt(&share, &ciphertext);
        debug!(?from, ballot = %request.ballot_id, index = partial.index, "partially decrypted");
        Ok(vec![Outgoing::Reply(
            from.clone(),
            Message::DecryptReply(DecryptReply {
                i: partial.index as i64,
                v: partial.value,
                session: request.session,
            }),
        )])
    }
}
