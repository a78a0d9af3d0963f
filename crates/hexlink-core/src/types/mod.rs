//! # Core Type Definitions
//!
//! This module contains the shared types of the Hexlink engine:
//! - Facts (`Triple`)
//! - Query inputs (`Filter`, `FilterSpec`, `Traversal`)
//! - Query outputs (`JsonObject`, `ResultSet`)
//! - Error types (`HexlinkError`)
//!
//! ## Determinism Guarantees
//!
//! Everything that reaches storage or a caller is ordered:
//! `BTreeMap` keyed results and `Ord` triples, never hash-ordered collections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// TRIPLE
// =============================================================================

/// A (subject, predicate, object) fact.
///
/// Triples are derived from flattened object properties and from link
/// discovery. They are never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Triple {
    /// Create a new triple.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

// =============================================================================
// QUERY INPUTS
// =============================================================================

/// A single predicate/value constraint.
///
/// A flattened leaf satisfies the filter when its path contains `predicate`
/// and its rendered value equals `target_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "Predicate")]
    pub predicate: String,
    #[serde(rename = "TargetValue")]
    pub target_value: String,
}

impl Filter {
    #[must_use]
    pub fn new(predicate: impl Into<String>, target_value: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            target_value: target_value.into(),
        }
    }
}

/// Per-type filter constraints: `{"<Type>": [{"Predicate": .., "TargetValue": ..}]}`.
///
/// A type with no entry (or an empty list) passes unconditionally.
pub type FilterSpec = BTreeMap<String, Vec<Filter>>;

/// Ordered list of declared types describing a multi-hop walk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Traversal {
    #[serde(rename = "TraversalSpec")]
    pub traversal_spec: Vec<String>,
}

impl Traversal {
    #[must_use]
    pub fn new<S: Into<String>>(types: impl IntoIterator<Item = S>) -> Self {
        Self {
            traversal_spec: types.into_iter().map(Into::into).collect(),
        }
    }
}

// =============================================================================
// QUERY OUTPUTS
// =============================================================================

/// A decoded JSON object (insertion ordered).
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Objects grouped by declared type.
pub type ResultSet = BTreeMap<String, Vec<JsonObject>>;

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Hexlink engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexlinkError {
    /// The requested id (or value, or predicate) is not in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input could not be decoded into a JSON object.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The classifier rejected an object.
    #[error("Classification error: {0}")]
    ClassificationError(String),

    /// The underlying key-value store failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A stored key does not have the `<order>|<f1>|<f2>|<f3>` shape.
    #[error("Corrupt hexastore key: {0}")]
    CorruptKey(String),

    /// A traversal spec is empty or names an empty type.
    #[error("Invalid traversal: {0}")]
    InvalidTraversal(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// An error raised inside a named pipeline stage.
    #[error("{stage}: {source}")]
    StageFailed {
        stage: String,
        source: Box<HexlinkError>,
    },

    /// A pipeline worker terminated without reporting an error.
    #[error("Pipeline failed: {0}")]
    PipelineFailed(String),
}

impl HexlinkError {
    /// Whether this error aborts a whole pipeline run.
    ///
    /// Non-fatal errors abort only the object being processed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MalformedInput(_) | Self::ClassificationError(_) | Self::NotFound(_) => false,
            Self::StageFailed { source, .. } => source.is_fatal(),
            _ => true,
        }
    }

    /// The innermost error, with stage wrappers removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Wrap this error with the name of the stage it came from.
    #[must_use]
    pub fn in_stage(self, stage: &str) -> Self {
        Self::StageFailed {
            stage: stage.to_string(),
            source: Box::new(self),
        }
    }
}

impl From<std::io::Error> for HexlinkError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_spec_wire_format() {
        let json = r#"{"TeachingGroup":[{"Predicate":"LocalId","TargetValue":"2"}]}"#;
        let spec: FilterSpec = serde_json::from_str(json).expect("parse");

        let filters = spec.get("TeachingGroup").expect("entry");
        assert_eq!(filters, &vec![Filter::new("LocalId", "2")]);
    }

    #[test]
    fn traversal_wire_format() {
        let json = r#"{"TraversalSpec":["StudentPersonal","TeachingGroup"]}"#;
        let traversal: Traversal = serde_json::from_str(json).expect("parse");

        assert_eq!(
            traversal,
            Traversal::new(["StudentPersonal", "TeachingGroup"])
        );
    }

    #[test]
    fn fatality_follows_root_cause() {
        assert!(!HexlinkError::MalformedInput("x".into()).is_fatal());
        assert!(HexlinkError::StorageError("x".into()).is_fatal());

        let wrapped = HexlinkError::CorruptKey("k".into()).in_stage("link_builder");
        assert!(wrapped.is_fatal());
        assert_eq!(wrapped.root(), &HexlinkError::CorruptKey("k".into()));
        assert_eq!(wrapped.to_string(), "link_builder: Corrupt hexastore key: k");
    }
}
