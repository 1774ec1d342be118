//! Process-wide mapping from ballot identifiers to the handlers serving them.

use crate::Error;
use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

/// Shared registry of live handlers keyed by ballot identifier.
///
/// Insertion is exclusive: a ballot can only be registered once until it is removed.
#[derive(Clone)]
pub struct Registry<V: Clone> {
    entries: Arc<RwLock<BTreeMap<Vec<u8>, V>>>,
}

impl<V: Clone> Default for Registry<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<V: Clone> Registry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `ballot_id`.
    pub fn register(&self, ballot_id: &[u8], value: V) -> Result<(), Error> {
        let mut entries = self.entries.write().map_err(|_| Error::Aborted)?;
        if entries.contains_key(ballot_id) {
            return Err(Error::AlreadyRegistered);
        }
        entries.insert(ballot_id.to_vec(), value);
        Ok(())
    }

    /// Returns the value registered for `ballot_id`.
    pub fn get(&self, ballot_id: &[u8]) -> Option<V> {
        self.entries.read().ok()?.get(ballot_id).cloned()
    }

    /// Removes and returns the value registered for `ballot_id`.
    pub fn remove(&self, ballot_id: &[u8]) -> Option<V> {
        self.entries.write().ok()?.remove(ballot_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
