//! # Audit Sink
//!
//! Terminal stage of every pipeline run. It has no effect on stored data;
//! it only emits `tracing` events under the `hexlink::audit` target.
//!
//! - `none`: silent
//! - `basic`: one event per object (id and type)
//! - `high`: adds triple, candidate and link counts plus link targets

use crate::HexlinkError;
use crate::ingest::IngestData;
use crate::traversal::TraversalData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verbosity of audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    #[default]
    None,
    Basic,
    High,
}

impl FromStr for AuditLevel {
    type Err = HexlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "basic" => Ok(Self::Basic),
            "high" => Ok(Self::High),
            other => Err(HexlinkError::ConfigError(format!(
                "unknown audit level '{other}' (expected none, basic or high)"
            ))),
        }
    }
}

impl fmt::Display for AuditLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::High => "high",
        })
    }
}

/// Audit one object leaving the ingest or removal pipeline.
pub fn record_object(level: AuditLevel, action: &'static str, igd: &IngestData) {
    match level {
        AuditLevel::None => {}
        AuditLevel::Basic => {
            tracing::info!(
                target: "hexlink::audit",
                action,
                id = %igd.id,
                object_type = %igd.object_type,
                "object {action}"
            );
        }
        AuditLevel::High => {
            let targets: Vec<&str> = igd
                .link_triples
                .iter()
                .map(|t| t.object.as_str())
                .collect();
            tracing::info!(
                target: "hexlink::audit",
                action,
                id = %igd.id,
                object_type = %igd.object_type,
                data_model = %igd.data_model,
                unique = igd.unique.as_deref().unwrap_or(""),
                triples = igd.triples.len(),
                candidates = igd.link_candidates.len(),
                links = igd.link_triples.len(),
                link_targets = ?targets,
                "object {action}"
            );
        }
    }
}

/// Audit a finished traversal.
pub fn record_traversal(level: AuditLevel, seed: &str, td: &TraversalData) {
    match level {
        AuditLevel::None => {}
        AuditLevel::Basic => {
            tracing::info!(
                target: "hexlink::audit",
                seed,
                matches = td.matches.len(),
                "traversal complete"
            );
        }
        AuditLevel::High => {
            tracing::info!(
                target: "hexlink::audit",
                seed,
                matches = ?td.matches,
                result_types = ?td.results.keys().collect::<Vec<_>>(),
                "traversal complete"
            );
        }
    }
}
