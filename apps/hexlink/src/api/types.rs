//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use hexlink_core::{FilterSpec, HexlinkError, ResultSet, StoreStats, Traversal};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub triples: u64,
    pub links: u64,
    pub filter_values: u64,
}

impl From<StoreStats> for StatusResponse {
    fn from(stats: StoreStats) -> Self {
        Self {
            triples: stats.triples,
            links: stats.links,
            filter_values: stats.filter_values,
        }
    }
}

// =============================================================================
// INGEST RESPONSE
// =============================================================================

/// Ingest response. The request body is any JSON object or array of objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub objects: Option<usize>,
    pub error: Option<String>,
}

impl IngestResponse {
    pub fn success(objects: usize) -> Self {
        Self {
            success: true,
            objects: Some(objects),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            objects: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DELETE RESPONSE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: String,
    pub error: Option<String>,
}

impl DeleteResponse {
    pub fn success(id: impl Into<String>) -> Self {
        Self {
            success: true,
            id: id.into(),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            id: id.into(),
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// QUERY REQUEST
// =============================================================================

/// Query request (tagged union).
///
/// ```json
/// {"type": "by_type", "object_type": "StudentPersonal",
///  "filter": {"StudentPersonal": [{"Predicate": "Name", "TargetValue": "Ann"}]}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryRequest {
    ByType {
        object_type: String,
        #[serde(default)]
        filter: FilterSpec,
    },
    ByValue {
        term: String,
        #[serde(default)]
        filter: FilterSpec,
    },
    ByPredicate {
        path: String,
        #[serde(default)]
        filter: FilterSpec,
    },
}

// =============================================================================
// TRAVERSE REQUEST
// =============================================================================

/// Where a traversal starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraverseStart {
    Id(String),
    Value(String),
}

/// Traverse request: exactly one of `id` or `value`, plus the walk.
///
/// ```json
/// {"id": "S1", "TraversalSpec": ["StudentPersonal", "TeachingGroup"]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraverseRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub traversal: Traversal,
    #[serde(default)]
    pub filter: FilterSpec,
}

impl TraverseRequest {
    /// The starting point, rejecting requests with both or neither of
    /// `id` and `value`.
    pub fn start(&self) -> Result<TraverseStart, HexlinkError> {
        match (&self.id, &self.value) {
            (Some(id), None) => Ok(TraverseStart::Id(id.clone())),
            (None, Some(value)) => Ok(TraverseStart::Value(value.clone())),
            _ => Err(HexlinkError::InvalidTraversal(
                "exactly one of 'id' or 'value' is required".to_string(),
            )),
        }
    }
}

// =============================================================================
// RESULTS RESPONSE
// =============================================================================

/// Objects grouped by declared type, shared by lookups, queries and
/// traversals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub success: bool,
    pub results: ResultSet,
    pub error: Option<String>,
}

impl ResultsResponse {
    pub fn success(results: ResultSet) -> Self {
        Self {
            success: true,
            results,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            results: ResultSet::new(),
            error: Some(msg.into()),
        }
    }
}
