//! Tracking of deals and responses for one participant until the key generation is certified.

use super::{
    dealer::Dealer,
    player::{check, respond, verify},
    types::{Deal, Response},
    Error,
};
use crate::primitives::{
    group::{KeyPair, Share},
    poly::Public,
};
use curve25519_dalek::{EdwardsPoint, Scalar};
use rand::{CryptoRng, RngCore};
use std::collections::{BTreeMap, BTreeSet};

/// Result of a certified key generation for one participant.
#[derive(Debug, Clone)]
pub struct Output {
    /// Dealers approved by every verifier.
    pub qualified: BTreeSet<u32>,
    /// Sum of the qualified dealers' commitments (constant term is the group key).
    pub public: Public,
    /// Private share of the group key.
    pub share: Share,
}

/// Distributed key generator of one participant.
pub struct Generator {
    key: KeyPair,
    index: u32,
    participants: Vec<EdwardsPoint>,
    threshold: u32,

    dealer: Dealer,

    sessions: BTreeMap<u32, [u8; 32]>,
    commitments: BTreeMap<u32, Public>,
    shares: BTreeMap<u32, Scalar>,
    responses: BTreeMap<u32, BTreeMap<u32, bool>>,
}

impl Generator {
    /// Creates a generator for the participant holding `key`.
    ///
    /// `participants` fixes the index of every participant and must contain `key` exactly once.
    pub fn new<R: RngCore + CryptoRng>(
        rng: &mut R,
        key: KeyPair,
        participants: Vec<EdwardsPoint>,
        threshold: u32,
    ) -> Result<Self, Error> {
        let n = participants.len() as u32;
        if threshold == 0 || threshold > n {
            return Err(Error::InvalidThreshold(threshold, n));
        }
        let mut positions = participants
            .iter()
            .enumerate()
            .filter(|(_, p)| *p == key.public())
            .map(|(i, _)| i as u32);
        let index = match (positions.next(), positions.next()) {
            (Some(index), None) => index,
            _ => return Err(Error::UnknownParticipant),
        };

        // Our own deal is approved by ourselves
        let dealer = Dealer::new(rng, index, &participants, threshold);
        let mut sessions = BTreeMap::new();
        sessions.insert(index, dealer.session_id());
        let mut commitments = BTreeMap::new();
        commitments.insert(index, dealer.commitments().clone());
        let mut shares = BTreeMap::new();
        shares.insert(index, dealer.share(index));
        let mut responses = BTreeMap::new();
        responses.insert(index, BTreeMap::from([(index, true)]));

        Ok(Self {
            key,
            index,
            participants,
            threshold,
            dealer,
            sessions,
            commitments,
            shares,
            responses,
        })
    }

    /// Position of this participant.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Creates the deal for every other participant, keyed by verifier index.
    pub fn deals<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<BTreeMap<u32, Deal>, Error> {
        let mut deals = BTreeMap::new();
        for verifier in 0..self.participants.len() as u32 {
            if verifier == self.index {
                continue;
            }
            let deal = self
                .dealer
                .deal(rng, &self.key, &self.participants, verifier)?;
            deals.insert(verifier, deal);
        }
        Ok(deals)
    }

    /// Processes the deal of another participant and returns the response to broadcast.
    pub fn process_deal(&mut self, deal: &Deal) -> Result<Response, Error> {
        let dealer = deal.index;
        if dealer as usize >= self.participants.len() || dealer == self.index {
            return Err(Error::InvalidDealer(dealer));
        }
        if self.sessions.contains_key(&dealer) {
            return Err(Error::DuplicateDeal(dealer));
        }
        let verified = verify(
            &self.key,
            self.index,
            &self.participants,
            self.threshold,
            deal,
        )?;

        let status = verified.share.is_some();
        self.sessions.insert(dealer, verified.session_id);
        self.commitments.insert(dealer, verified.commitments);
        if let Some(share) = verified.share {
            self.shares.insert(dealer, share);
        }
        let responses = self.responses.entry(dealer).or_default();
        responses.insert(self.index, status);
        responses.insert(dealer, true);

        Ok(Response {
            index: dealer,
            response: respond(&self.key, self.index, verified.session_id, status),
        })
    }

    /// Processes the response of another verifier to a deal that was already processed.
    pub fn process_response(&mut self, response: &Response) -> Result<(), Error> {
        let dealer = response.index;
        let verifier = response.response.index;
        let n = self.participants.len();
        if dealer as usize >= n {
            return Err(Error::InvalidDealer(dealer));
        }
        if verifier as usize >= n || verifier == self.index {
            return Err(Error::InvalidVerifier(verifier));
        }
        let session = self
            .sessions
            .get(&dealer)
            .ok_or(Error::UnknownDealer(dealer))?;
        if response.response.session_id.as_slice() != session.as_slice() {
            return Err(Error::InvalidSessionId);
        }
        check(&self.participants[verifier as usize], &response.response)?;

        let responses = self.responses.entry(dealer).or_default();
        if responses.contains_key(&verifier) {
            return Err(Error::DuplicateResponse(dealer, verifier));
        }
        responses.insert(verifier, response.response.status);
        Ok(())
    }

    /// Returns whether the deal of `dealer` has been processed.
    pub fn has_deal(&self, dealer: u32) -> bool {
        self.sessions.contains_key(&dealer)
    }

    /// Returns whether every verifier has responded to every dealer.
    pub fn certified(&self) -> bool {
        let n = self.participants.len();
        self.responses.len() == n && self.responses.values().all(|r| r.len() == n)
    }

    /// Dealers approved by every verifier.
    pub fn qualified(&self) -> BTreeSet<u32> {
        let n = self.participants.len();
        self.responses
            .iter()
            .filter(|(_, r)| r.len() == n && r.values().all(|status| *status))
            .map(|(dealer, _)| *dealer)
            .collect()
    }

    /// Computes the group key and the private share from the qualified dealers.
    pub fn finalize(&self) -> Result<Output, Error> {
        if !self.certified() {
            return Err(Error::NotCertified);
        }
        let qualified = self.qualified();
        if (qualified.len() as u32) < self.threshold {
            return Err(Error::InsufficientQualified(qualified.len(), self.threshold));
        }

        let mut public: Option<Public> = None;
        let mut private = Scalar::ZERO;
        for dealer in &qualified {
            let commitment = self
                .commitments
                .get(dealer)
                .ok_or(Error::UnknownDealer(*dealer))?;
            let share = self.shares.get(dealer).ok_or(Error::UnknownDealer(*dealer))?;
            match public.as_mut() {
                Some(public) => public.add(commitment),
                None => public = Some(commitment.clone()),
            }
            private += share;
        }
        let public = public.ok_or(Error::NotCertified)?;
        Ok(Output {
            qualified,
            public,
            share: Share {
                index: self.index,
                private,
            },
        })
    }
}
