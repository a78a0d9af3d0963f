//! # redb-backed Hexastore
//!
//! A disk-backed [`TripleStore`] using the redb embedded database.
//!
//! All keys live in one table with empty values; the order tag at the
//! front of each key keeps the twelve orderings (six primary, six link)
//! in disjoint ranges. redb provides what the pipelines rely on:
//! - One write transaction per [`WriteBatch`] (atomic sextuples)
//! - MVCC snapshot reads that never block the writer
//! - Crash safety via copy-on-write B-trees

use super::{TripleStore, WriteBatch, storage_err};
use crate::HexlinkError;
use redb::{Database, ReadableDatabase, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for hexastore keys: `<order>|<f1>|<f2>|<f3>` -> empty value
const HEXASTORE: TableDefinition<&str, &[u8]> = TableDefinition::new("hexastore");

/// Value stored under every key.
const EMPTY: &[u8] = &[];

/// A disk-backed hexastore using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a hexastore database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HexlinkError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(storage_err)?;
            let _ = write_txn.open_table(HEXASTORE).map_err(storage_err)?;
            write_txn.commit().map_err(storage_err)?;
        }

        Ok(Self { db })
    }

    /// Total number of keys held.
    pub fn len(&self) -> Result<u64, HexlinkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(HEXASTORE).map_err(storage_err)?;
        table.len().map_err(storage_err)
    }
}

impl TripleStore for RedbStore {
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, HexlinkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(HEXASTORE).map_err(storage_err)?;

        let mut keys = Vec::new();
        for entry in table.range::<&str>(prefix..).map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn contains(&self, key: &str) -> Result<bool, HexlinkError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(HEXASTORE).map_err(storage_err)?;
        Ok(table.get(key).map_err(storage_err)?.is_some())
    }

    fn apply(&self, batch: &WriteBatch) -> Result<(), HexlinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(HEXASTORE).map_err(storage_err)?;
            for key in batch.deletes() {
                table.remove(key.as_str()).map_err(storage_err)?;
            }
            for key in batch.sets() {
                table.insert(key.as_str(), EMPTY).map_err(storage_err)?;
            }
        }
        write_txn.commit().map_err(storage_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Triple;
    use crate::hexastore::Namespace;
    use tempfile::tempdir;

    #[test]
    fn create_and_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        {
            let store = RedbStore::open(&db_path).expect("open db");
            let mut batch = WriteBatch::new();
            batch.insert_triple(&Triple::new("S1", "is-a", "Student"), Namespace::Primary);
            store.apply(&batch).expect("apply");
        }

        let store = RedbStore::open(&db_path).expect("reopen db");
        assert_eq!(store.len().expect("len"), 6);
        assert!(store.contains("pos|is-a|Student|S1").expect("contains"));
    }

    #[test]
    fn prefix_scan_stops_at_boundary() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("scan.redb")).expect("open db");

        let mut batch = WriteBatch::new();
        batch.insert_triple(&Triple::new("S1", "name", "Ann"), Namespace::Primary);
        batch.insert_triple(&Triple::new("S10", "name", "Bob"), Namespace::Primary);
        batch.insert_triple(&Triple::new("S1", "references", "T1"), Namespace::Link);
        store.apply(&batch).expect("apply");

        assert_eq!(
            store.scan_prefix("spo|S1|").expect("scan"),
            vec!["spo|S1|name|Ann".to_string()]
        );
        assert_eq!(store.scan_prefix("spo|S1").expect("scan").len(), 2);
        assert_eq!(store.count_prefix("spol|").expect("count"), 1);
    }

    #[test]
    fn batch_delete_removes_sextuple() {
        let temp = tempdir().expect("temp dir");
        let store = RedbStore::open(temp.path().join("delete.redb")).expect("open db");
        let triple = Triple::new("a", "b", "c");

        let mut batch = WriteBatch::new();
        batch.insert_triple(&triple, Namespace::Primary);
        store.apply(&batch).expect("apply");

        let mut batch = WriteBatch::new();
        batch.delete_triple(&triple, Namespace::Primary);
        batch.delete_triple(&Triple::new("never", "was", "stored"), Namespace::Primary);
        store.apply(&batch).expect("apply");

        assert_eq!(store.len().expect("len"), 0);
    }
}
