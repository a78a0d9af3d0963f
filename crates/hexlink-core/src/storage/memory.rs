//! In-memory [`TripleStore`] over a `BTreeSet`.
//!
//! Used for tests and ephemeral stores. A single `RwLock` gives the same
//! guarantees the redb backend gets from its transactions: each scan reads
//! one consistent state and each batch lands atomically.

use super::{TripleStore, WriteBatch};
use crate::HexlinkError;
use parking_lot::RwLock;
use std::collections::BTreeSet;

/// Ephemeral ordered key set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<BTreeSet<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Copy of every key, in order.
    #[must_use]
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.keys.read().clone()
    }
}

impl TripleStore for MemoryStore {
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, HexlinkError> {
        let keys = self.keys.read();
        Ok(keys
            .range(prefix.to_string()..)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn contains(&self, key: &str) -> Result<bool, HexlinkError> {
        Ok(self.keys.read().contains(key))
    }

    fn apply(&self, batch: &WriteBatch) -> Result<(), HexlinkError> {
        let mut keys = self.keys.write();
        for key in batch.deletes() {
            keys.remove(key);
        }
        for key in batch.sets() {
            keys.insert(key.clone());
        }
        Ok(())
    }
}
