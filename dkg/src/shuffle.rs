//! Consult the output of a ballot shuffle before decrypting.
//!
//! A ballot is shuffled by a sequence of instances, each re-encrypting and permuting the
//! ciphertexts of the previous one. Once `shuffle_threshold` instances have run, the
//! ciphertexts of the last counted instance can no longer be linked to their voters and
//! only those may be decrypted.

use crate::{primitives::elgamal::Ciphertext, Error};
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

/// Output of one shuffle instance.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShuffleInstance {
    pub shuffled_ballots: Vec<Ciphertext>,
}

/// Shuffle state of a ballot as recorded by the ordering service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ballot {
    /// Number of shuffle instances required before decryption.
    pub shuffle_threshold: usize,
    pub shuffle_instances: Vec<ShuffleInstance>,
}

impl Ballot {
    /// Returns the ciphertexts eligible for decryption, if enough shuffles ran.
    pub fn shuffled(&self) -> Option<&[Ciphertext]> {
        let last = self.shuffle_threshold.checked_sub(1)?;
        self.shuffle_instances
            .get(last)
            .map(|instance| instance.shuffled_ballots.as_slice())
    }
}

/// Source of ballots, usually backed by the ordering service.
pub trait Ballots: Send + Sync + 'static {
    /// Returns the current state of a ballot, if it exists.
    fn get_ballot(&self, ballot_id: &str) -> Option<Ballot>;
}

/// Checks that `ciphertext` was output by the shuffle of `ballot_id`.
pub fn check(ballots: &dyn Ballots, ballot_id: &str, ciphertext: &Ciphertext) -> Result<(), Error> {
    let ballot = ballots
        .get_ballot(ballot_id)
        .ok_or_else(|| Error::UnknownBallot(ballot_id.to_string()))?;
    let shuffled = ballot.shuffled().ok_or(Error::NotShuffled)?;
    if !shuffled.contains(ciphertext) {
        return Err(Error::NotShuffled);
    }
    Ok(())
}

/// In-memory [Ballots] that can be updated while shared.
#[derive(Clone, Default)]
pub struct MemoryBallots {
    ballots: Arc<RwLock<BTreeMap<String, Ballot>>>,
}

impl MemoryBallots {
    /// Inserts or replaces a ballot.
    pub fn put(&self, ballot_id: &str, ballot: Ballot) {
        if let Ok(mut ballots) = self.ballots.write() {
            ballots.insert(ballot_id.to_string(), ballot);
        }
    }

    /// Appends the output of a shuffle instance to a ballot, creating it if needed.
    pub fn push_instance(&self, ballot_id: &str, shuffle_threshold: usize, instance: ShuffleInstance) {
        if let Ok(mut ballots) = self.ballots.write() {
            let ballot = ballots.entry(ballot_id.to_string()).or_default();
            ballot.shuffle_threshold = shuffle_threshold;
            ballot.shuffle_instances.push(instance);
        }
    }
}

impl Ballots for MemoryBallots {
    fn get_ballot(&self, ballot_id: &str) -> Option<Ballot> {
        self.ballots.read().ok()?.get(ballot_id).cloned()
    }
}
