//! # Traversal Engine
//!
//! Walks `references` edges following a list of declared types. For a spec
//! `[A, B, C]` the run is:
//!
//! ```text
//! seed -> type_match[A] -> link_follow -> type_match[B]
//!      -> link_follow -> type_match[C] -> hydrator -> audit
//! ```
//!
//! Type matching keeps only the current targets asserted (`is-a`) to be of
//! the stage's type and that pass its filters. Link following replaces the
//! targets with every id one edge away, in either direction. Every match is
//! recorded; the hydrator reassembles them at the end, grouped by the type
//! they matched as.
//!
//! A stage with no targets passes an empty set on, so an unmatched hop
//! yields an empty result rather than an error.

use crate::audit::{self, AuditLevel};
use crate::hexastore::{self, Namespace, Permutation};
use crate::pipeline::{Pipeline, Stage};
use crate::primitives::{IS_A, REFERENCES, UNKNOWN_TYPE, is_anchor_type};
use crate::query;
use crate::results::{self, matches_filters, strip_bookkeeping};
use crate::storage::TripleStore;
use crate::{FilterSpec, HexlinkError, ResultSet, Triple};
use std::collections::BTreeMap;

/// State carried through one traversal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraversalData {
    /// Every id matched so far, with the type it matched as.
    pub matches: BTreeMap<String, String>,
    /// Ids under consideration by the next stage, with their last known type.
    pub targets: BTreeMap<String, String>,
    /// Hydrated objects, filled by the final stage.
    pub results: ResultSet,
}

impl TraversalData {
    /// A traversal starting from a single id of unknown type.
    #[must_use]
    pub fn seeded(id: &str) -> Self {
        Self {
            targets: [(id.to_string(), UNKNOWN_TYPE.to_string())].into(),
            ..Self::default()
        }
    }

    /// Record `id` as matching `object_type`.
    ///
    /// A real type is never replaced by an anchor type.
    pub fn record_match(&mut self, id: &str, object_type: &str) {
        if let Some(existing) = self.matches.get(id) {
            if !is_anchor_type(existing) && is_anchor_type(object_type) {
                return;
            }
        }
        self.matches.insert(id.to_string(), object_type.to_string());
    }
}

// =============================================================================
// STAGES
// =============================================================================

struct TypeMatch<'a> {
    store: &'a dyn TripleStore,
    object_type: &'a str,
    spec: &'a FilterSpec,
}

impl Stage<TraversalData> for TypeMatch<'_> {
    fn name(&self) -> &'static str {
        "type_match"
    }

    fn process(&mut self, mut td: TraversalData) -> Result<Option<TraversalData>, HexlinkError> {
        let filters = self.spec.get(self.object_type);
        let mut matched = BTreeMap::new();

        for id in td.targets.keys() {
            let assertion = Triple::new(id, IS_A, self.object_type);
            let key = hexastore::key(Permutation::Osp, Namespace::Primary, &assertion);
            if !self.store.contains(&key)? {
                continue;
            }
            if let Some(filters) = filters {
                let object = match query::load_object(self.store, id) {
                    Ok(object) => object,
                    Err(HexlinkError::NotFound(_)) => continue,
                    Err(err) => return Err(err),
                };
                if !matches_filters(&object.fields, filters) {
                    continue;
                }
            }
            matched.insert(id.clone(), self.object_type.to_string());
        }

        for id in matched.keys() {
            td.record_match(id, self.object_type);
        }
        td.targets = matched;
        Ok(Some(td))
    }
}

struct LinkFollow<'a> {
    store: &'a dyn TripleStore,
}

impl Stage<TraversalData> for LinkFollow<'_> {
    fn name(&self) -> &'static str {
        "link_follow"
    }

    fn process(&mut self, mut td: TraversalData) -> Result<Option<TraversalData>, HexlinkError> {
        let mut next = BTreeMap::new();
        for (id, previous_type) in &td.targets {
            let inbound =
                hexastore::prefix(Permutation::Pos, Namespace::Link, &[REFERENCES, id.as_str()]);
            for edge in self.store.scan_triples(&inbound, Namespace::Link)? {
                next.insert(edge.subject, previous_type.clone());
            }
            let outbound =
                hexastore::prefix(Permutation::Pso, Namespace::Link, &[REFERENCES, id.as_str()]);
            for edge in self.store.scan_triples(&outbound, Namespace::Link)? {
                next.insert(edge.object, previous_type.clone());
            }
        }
        td.targets = next;
        Ok(Some(td))
    }
}

struct Hydrator<'a> {
    store: &'a dyn TripleStore,
}

impl Stage<TraversalData> for Hydrator<'_> {
    fn name(&self) -> &'static str {
        "hydrator"
    }

    fn process(&mut self, mut td: TraversalData) -> Result<Option<TraversalData>, HexlinkError> {
        let mut grouped = ResultSet::new();
        for (id, object_type) in &td.matches {
            let mut object = match query::load_object(self.store, id) {
                Ok(object) => object.fields,
                Err(HexlinkError::NotFound(_)) => {
                    tracing::warn!(id = %id, "traversal match vanished before hydration");
                    continue;
                }
                Err(err) => return Err(err),
            };
            strip_bookkeeping(&mut object);
            if !object.is_empty() {
                grouped.entry(object_type.clone()).or_default().push(object);
            }
        }
        td.results = grouped;
        Ok(Some(td))
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

fn validate(spec: &[String]) -> Result<(), HexlinkError> {
    if spec.is_empty() {
        return Err(HexlinkError::InvalidTraversal(
            "traversal spec must name at least one type".to_string(),
        ));
    }
    if let Some(position) = spec.iter().position(String::is_empty) {
        return Err(HexlinkError::InvalidTraversal(format!(
            "traversal spec element {position} is empty"
        )));
    }
    Ok(())
}

/// Walk from `id` through the declared types in `spec`.
pub fn traversal_with_id(
    store: &dyn TripleStore,
    id: &str,
    spec: &[String],
    filters: &FilterSpec,
    audit_level: AuditLevel,
) -> Result<ResultSet, HexlinkError> {
    validate(spec)?;

    let mut pipeline = Pipeline::new("traversal");
    for (position, object_type) in spec.iter().enumerate() {
        if position > 0 {
            pipeline = pipeline.stage(LinkFollow { store });
        }
        pipeline = pipeline.stage(TypeMatch {
            store,
            object_type: object_type.as_str(),
            spec: filters,
        });
    }
    pipeline = pipeline.stage(Hydrator { store });

    let mut finished = None;
    pipeline.run([Ok(TraversalData::seeded(id))], |td| {
        audit::record_traversal(audit_level, id, &td);
        finished = Some(td.results);
        Ok(())
    })?;
    Ok(finished.unwrap_or_default())
}

/// Run [`traversal_with_id`] from every id holding a value starting with
/// `term`, and union the results.
pub fn traversal_with_value(
    store: &dyn TripleStore,
    term: &str,
    spec: &[String],
    filters: &FilterSpec,
    audit_level: AuditLevel,
) -> Result<ResultSet, HexlinkError> {
    validate(spec)?;

    let mut merged = ResultSet::new();
    for id in query::value_subjects(store, term)? {
        let found = traversal_with_id(store, &id, spec, filters, audit_level)?;
        results::merge(&mut merged, found);
    }
    Ok(merged)
}

// =============================================================================
// TESTS
// =============================================================================
