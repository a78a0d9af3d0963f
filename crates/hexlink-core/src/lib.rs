//! # hexlink-core
//!
//! The hexastore graph engine for Hexlink - THE ENGINE.
//!
//! This crate stores arbitrary JSON objects as triples and links them to
//! each other automatically, from property values they share, so callers
//! can query objects and walk multi-hop paths between them without
//! declaring a schema up front.
//!
//! ## Data Flow
//!
//! - `ingest`: classify, flatten, write sextuples, discover and write links
//! - `query`: prefix scans over one ordering, then reassembly
//! - `traversal`: alternating type-match and link-follow stages
//!
//! All three run on the staged worker coordinator in `pipeline`.
//!
//! ## Architectural Constraints
//!
//! - Every triple is written as a complete sextuple in one batch
//! - Link edges live in their own key namespace (`spol`, `posl`, ...)
//! - The link filter is owned by the store instance, never global
//! - Everything that reaches storage or a caller is ordered (BTree*)
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod audit;
pub mod classify;
pub mod config;
pub mod formats;
pub mod hexastore;
pub mod ingest;
pub mod link_filter;
pub mod pipeline;
pub mod primitives;
pub mod query;
pub mod results;
pub mod storage;
pub mod store;
pub mod traversal;
pub mod tuples;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Filter, FilterSpec, HexlinkError, JsonObject, ResultSet, Traversal, Triple};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use audit::AuditLevel;
pub use classify::{Classification, Classifier, ConfigClassifier, DataTypeRule};
pub use config::StoreConfig;
pub use hexastore::{Namespace, Permutation};
pub use link_filter::{LinkFilter, ScalableBloomFilter, ScalableLinkFilter};
pub use pipeline::{CancelScope, Pipeline, Stage};
pub use query::StoredObject;
pub use storage::{MemoryStore, RedbStore, TripleStore, WriteBatch};
pub use store::{HexStore, StoreStats};
pub use traversal::TraversalData;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, filter_from_bytes, filter_to_bytes};
