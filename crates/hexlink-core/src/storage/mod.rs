//! # Ordered Key-Value Storage
//!
//! The hexastore is an existence-only index: every key carries an empty
//! value, and all reads are prefix range scans over lexicographically
//! ordered UTF-8 keys.
//!
//! [`TripleStore`] is the collaborator contract. Writes arrive as a
//! [`WriteBatch`] that always holds complete sextuples, so no caller can
//! store fewer than six keys for a triple.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::hexastore::{self, Namespace};
use crate::{HexlinkError, Triple};

// =============================================================================
// WRITE BATCH
// =============================================================================

/// A set of key insertions and deletions applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    sets: Vec<String>,
    deletes: Vec<String>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue all six keys of `triple` for insertion.
    pub fn insert_triple(&mut self, triple: &Triple, namespace: Namespace) {
        self.sets.extend(hexastore::encode(triple, namespace));
    }

    /// Queue all six keys of `triple` for deletion.
    pub fn delete_triple(&mut self, triple: &Triple, namespace: Namespace) {
        self.deletes.extend(hexastore::encode(triple, namespace));
    }

    /// Keys to insert.
    #[must_use]
    pub fn sets(&self) -> &[String] {
        &self.sets
    }

    /// Keys to delete.
    #[must_use]
    pub fn deletes(&self) -> &[String] {
        &self.deletes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.deletes.is_empty()
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// An ordered, existence-only key-value store.
///
/// Implementations must be safe to share between pipeline threads:
/// readers see a consistent snapshot per call, and each [`WriteBatch`] is
/// applied atomically.
pub trait TripleStore: Send + Sync {
    /// All keys starting with `prefix`, in ascending order.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, HexlinkError>;

    /// Whether `key` is present.
    fn contains(&self, key: &str) -> Result<bool, HexlinkError>;

    /// Apply a batch atomically. Deletions of absent keys are ignored.
    fn apply(&self, batch: &WriteBatch) -> Result<(), HexlinkError>;

    /// Number of keys starting with `prefix`.
    fn count_prefix(&self, prefix: &str) -> Result<u64, HexlinkError> {
        Ok(self.scan_prefix(prefix)?.len() as u64)
    }

    /// Decode every key under `prefix` as a triple of `namespace`.
    fn scan_triples(&self, prefix: &str, namespace: Namespace) -> Result<Vec<Triple>, HexlinkError> {
        self.scan_prefix(prefix)?
            .iter()
            .map(|key| hexastore::decode_in(key, namespace))
            .collect()
    }
}

/// Map any backend error into a storage failure.
pub(crate) fn storage_err(err: impl std::fmt::Display) -> HexlinkError {
    HexlinkError::StorageError(err.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
