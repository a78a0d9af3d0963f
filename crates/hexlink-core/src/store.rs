//! # HexStore
//!
//! The entry point of the engine. A `HexStore` owns one triple store, one
//! link filter and one classifier, and lends them to every pipeline run.
//!
//! ## On-disk layout
//!
//! ```text
//! <folder>/
//!   hexastore.redb          primary + link sextuples
//!   sbf/featureLinks.sbf    persisted link filter
//!   config/datatypes.toml   classifier rules (written on first open)
//! ```
//!
//! The filter is loaded once on open and persisted on [`HexStore::flush`]
//! and [`HexStore::close`].

use crate::classify::{Classifier, ConfigClassifier, DEFAULT_DATATYPES};
use crate::config::StoreConfig;
use crate::hexastore::{self, Namespace, Permutation};
use crate::ingest::{self, RunContext};
use crate::link_filter::{LinkFilter, ScalableLinkFilter};
use crate::storage::{MemoryStore, RedbStore, TripleStore};
use crate::{FilterSpec, HexlinkError, ResultSet, Traversal, query, traversal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

/// Counts reported by [`HexStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Primary triples, anchors included.
    pub triples: u64,
    /// `references` edges.
    pub links: u64,
    /// Distinct values declared to the link filter.
    pub filter_values: u64,
}

/// A hexastore graph of linked JSON objects.
pub struct HexStore {
    store: Box<dyn TripleStore>,
    filter: ScalableLinkFilter,
    classifier: Box<dyn Classifier>,
    config: StoreConfig,
    persistent: bool,
}

impl std::fmt::Debug for HexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HexStore")
            .field("config", &self.config)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

fn timed<R>(
    operation: &'static str,
    f: impl FnOnce() -> Result<R, HexlinkError>,
) -> Result<R, HexlinkError> {
    let started = Instant::now();
    let result = f();
    tracing::debug!(
        operation,
        ok = result.is_ok(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "store operation"
    );
    result
}

impl HexStore {
    // =========================================================================
    // CONSTRUCTORS
    // =========================================================================

    /// Open (or create) a store in `folder` with default settings.
    pub fn open(folder: impl AsRef<Path>) -> Result<Self, HexlinkError> {
        Self::open_with_config(StoreConfig::for_folder(folder.as_ref()))
    }

    /// Open (or create) a store described by `config`.
    pub fn open_with_config(config: StoreConfig) -> Result<Self, HexlinkError> {
        config.validate()?;
        let folder = config.folder();
        std::fs::create_dir_all(&folder)?;

        let classifier_path = config.classifier_path();
        if config.classifier_config.is_none() && !classifier_path.exists() {
            if let Some(parent) = classifier_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&classifier_path, DEFAULT_DATATYPES)?;
            tracing::info!(path = %classifier_path.display(), "wrote default classifier rules");
        }
        let classifier = ConfigClassifier::from_file(&classifier_path)?;

        let store = RedbStore::open(config.database_path())?;
        let filter = ScalableLinkFilter::load_from(
            &config.filter_path(),
            config.false_positive_rate,
            config.initial_capacity,
        )?;

        tracing::info!(
            folder = %folder.display(),
            classifiers = classifier.rules().len(),
            audit = %config.audit_level,
            "store opened"
        );
        Ok(Self {
            store: Box::new(store),
            filter,
            classifier: Box::new(classifier),
            config,
            persistent: true,
        })
    }

    /// An ephemeral store; nothing is written to disk.
    #[must_use]
    pub fn in_memory(classifier: impl Classifier + 'static) -> Self {
        Self::with_backend(MemoryStore::new(), classifier, StoreConfig::default())
    }

    /// A store over any backend. The filter is never persisted.
    #[must_use]
    pub fn with_backend(
        store: impl TripleStore + 'static,
        classifier: impl Classifier + 'static,
        config: StoreConfig,
    ) -> Self {
        let filter = ScalableLinkFilter::new(config.false_positive_rate, config.initial_capacity);
        Self {
            store: Box::new(store),
            filter,
            classifier: Box::new(classifier),
            config,
            persistent: false,
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn ctx(&self) -> RunContext<'_> {
        RunContext {
            store: self.store.as_ref(),
            filter: &self.filter,
            classifier: self.classifier.as_ref(),
            audit: self.config.audit_level,
        }
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Ingest JSON values; each may be an object or an array of objects.
    ///
    /// Returns the number of objects stored.
    pub fn ingest_values(&self, values: Vec<Value>) -> Result<usize, HexlinkError> {
        timed("ingest_values", || {
            ingest::run_ingest(self.ctx(), ingest::values_source(values))
        })
    }

    /// Ingest a stream of concatenated JSON values.
    pub fn ingest_reader<R: Read + Send>(&self, reader: R) -> Result<usize, HexlinkError> {
        timed("ingest_reader", || {
            ingest::run_ingest(self.ctx(), ingest::reader_source(reader))
        })
    }

    /// Ingest a file of JSON values.
    pub fn ingest_file(&self, path: impl AsRef<Path>) -> Result<usize, HexlinkError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| HexlinkError::IoError(format!("{}: {}", path.display(), e)))?;
        let count = self.ingest_reader(BufReader::new(file))?;
        tracing::info!(path = %path.display(), objects = count, "file ingested");
        Ok(count)
    }

    /// Remove an object, its links and any anchors it leaves unreferenced.
    pub fn delete(&self, id: &str) -> Result<(), HexlinkError> {
        timed("delete", || ingest::remove_object(self.ctx(), id))
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn find_by_id(&self, id: &str, filters: &FilterSpec) -> Result<ResultSet, HexlinkError> {
        timed("find_by_id", || query::find_by_id(self.store.as_ref(), id, filters))
    }

    pub fn find_by_type(
        &self,
        object_type: &str,
        filters: &FilterSpec,
    ) -> Result<ResultSet, HexlinkError> {
        timed("find_by_type", || {
            query::find_by_type(self.store.as_ref(), object_type, filters)
        })
    }

    pub fn find_by_value(&self, term: &str, filters: &FilterSpec) -> Result<ResultSet, HexlinkError> {
        timed("find_by_value", || {
            query::find_by_value(self.store.as_ref(), term, filters)
        })
    }

    pub fn find_by_predicate(
        &self,
        path: &str,
        filters: &FilterSpec,
    ) -> Result<ResultSet, HexlinkError> {
        timed("find_by_predicate", || {
            query::find_by_predicate(self.store.as_ref(), path, filters)
        })
    }

    /// Multi-hop walk from `id`.
    pub fn traversal_with_id(
        &self,
        id: &str,
        walk: &Traversal,
        filters: &FilterSpec,
    ) -> Result<ResultSet, HexlinkError> {
        timed("traversal_with_id", || {
            traversal::traversal_with_id(
                self.store.as_ref(),
                id,
                &walk.traversal_spec,
                filters,
                self.config.audit_level,
            )
        })
    }

    /// Multi-hop walk from every object holding a value starting with `term`.
    pub fn traversal_with_value(
        &self,
        term: &str,
        walk: &Traversal,
        filters: &FilterSpec,
    ) -> Result<ResultSet, HexlinkError> {
        timed("traversal_with_value", || {
            traversal::traversal_with_value(
                self.store.as_ref(),
                term,
                &walk.traversal_spec,
                filters,
                self.config.audit_level,
            )
        })
    }

    pub fn stats(&self) -> Result<StoreStats, HexlinkError> {
        let primary = hexastore::prefix(Permutation::Spo, Namespace::Primary, &[]);
        let links = hexastore::prefix(Permutation::Spo, Namespace::Link, &[]);
        Ok(StoreStats {
            triples: self.store.count_prefix(&primary)?,
            links: self.store.count_prefix(&links)?,
            filter_values: self.filter.len(),
        })
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Persist the link filter. A no-op for stores without a folder.
    pub fn flush(&self) -> Result<(), HexlinkError> {
        if !self.persistent {
            return Ok(());
        }
        timed("flush", || self.filter.persist_to(&self.config.filter_path()))
    }

    /// Flush and release the store.
    pub fn close(self) -> Result<(), HexlinkError> {
        self.flush()?;
        tracing::info!(folder = %self.config.folder().display(), "store closed");
        Ok(())
    }
}
