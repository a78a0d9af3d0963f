//! Stages shared by the ingest and removal pipelines.

use super::{IngestData, Mode, RunContext, has_reserved_fields, remove_object};
use crate::hexastore::{self, Namespace, Permutation};
use crate::pipeline::Stage;
use crate::primitives::{
    IS_A, PROPERTY_LINK, REFERENCES, REVERSE_PREDICATE, REVERSE_SUBJECT, UNIQUE, UNIQUE_LINK,
    is_anchor_type,
};
use crate::storage::{TripleStore, WriteBatch};
use crate::tuples::generate_triples;
use crate::{HexlinkError, Triple};
use std::collections::BTreeSet;

fn has_type(store: &dyn TripleStore, id: &str) -> Result<bool, HexlinkError> {
    let prefix = hexastore::prefix(Permutation::Spo, Namespace::Primary, &[id, IS_A]);
    Ok(store.count_prefix(&prefix)? > 0)
}

// =============================================================================
// CLASSIFY
// =============================================================================

/// Assigns type, identity and unique key, and records them on the object.
pub(super) struct Classify<'a> {
    ctx: RunContext<'a>,
}

impl<'a> Classify<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for Classify<'_> {
    fn name(&self) -> &'static str {
        "classify"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        if has_reserved_fields(&igd.raw) {
            tracing::warn!("input object carries reserved '{IS_A}'/'{UNIQUE}' fields; overwriting");
        }
        let classification = self.ctx.classifier.classify(&igd.raw)?;

        igd.data_model = classification.data_model.clone();
        igd.link_specs = classification.link_specs.clone();
        match igd.pinned.take() {
            Some(identity) => {
                igd.id = identity.id;
                igd.object_type = identity.object_type;
                igd.unique = identity.unique;
            }
            None => {
                igd.unique = classification.unique();
                igd.object_type = classification.object_type;
                igd.id = classification
                    .id
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            }
        }

        igd.raw.insert(IS_A.to_string(), igd.object_type.clone().into());
        match &igd.unique {
            Some(unique) => {
                igd.raw.insert(UNIQUE.to_string(), unique.clone().into());
            }
            None => {
                igd.raw.shift_remove(UNIQUE);
            }
        }
        Ok(Some(igd))
    }
}

// =============================================================================
// OBJECT REMOVER
// =============================================================================

/// Removes any stored version of the incoming object before it is written.
pub(super) struct ObjectRemover<'a> {
    ctx: RunContext<'a>,
}

impl<'a> ObjectRemover<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for ObjectRemover<'_> {
    fn name(&self) -> &'static str {
        "object_remover"
    }

    fn process(&mut self, igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        match remove_object(self.ctx, &igd.id) {
            Ok(()) => tracing::debug!(id = %igd.id, "replacing stored object"),
            Err(err) if matches!(err.root(), HexlinkError::NotFound(_)) => {}
            Err(err) => return Err(err),
        }
        Ok(Some(igd))
    }
}

// =============================================================================
// TUPLES
// =============================================================================

/// Flattens the object into one triple per leaf.
pub(super) struct TupleGenerator;

impl Stage<IngestData> for TupleGenerator {
    fn name(&self) -> &'static str {
        "tuple_generator"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        igd.triples = generate_triples(&igd.id, &igd.raw);
        Ok(Some(igd))
    }
}

/// Writes or deletes the primary sextuples of every generated triple.
///
/// In [`Mode::Remove`] every stored primary triple of the object is deleted
/// as well, so leaves that do not survive reassembly are still removed.
/// Anchor `is-a` triples sharing the id are left to [`AnchorPruner`].
pub(super) struct TripleWriter<'a> {
    ctx: RunContext<'a>,
    mode: Mode,
}

impl<'a> TripleWriter<'a> {
    pub(super) fn new(ctx: RunContext<'a>, mode: Mode) -> Self {
        Self { ctx, mode }
    }
}

impl Stage<IngestData> for TripleWriter<'_> {
    fn name(&self) -> &'static str {
        match self.mode {
            Mode::Write => "triple_writer",
            Mode::Remove => "triple_remover",
        }
    }

    fn process(&mut self, igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let mut batch = WriteBatch::new();
        match self.mode {
            Mode::Write => {
                for triple in &igd.triples {
                    batch.insert_triple(triple, Namespace::Primary);
                }
            }
            Mode::Remove => {
                let stored =
                    hexastore::prefix(Permutation::Spo, Namespace::Primary, &[igd.id.as_str()]);
                let mut doomed: BTreeSet<Triple> = igd.triples.iter().cloned().collect();
                doomed.extend(
                    self.ctx
                        .store
                        .scan_triples(&stored, Namespace::Primary)?
                        .into_iter()
                        .filter(|t| !(t.predicate == IS_A && is_anchor_type(&t.object))),
                );
                for triple in &doomed {
                    batch.delete_triple(triple, Namespace::Primary);
                }
            }
        }
        self.ctx.store.apply(&batch)?;
        Ok(Some(igd))
    }
}

// =============================================================================
// LINK DISCOVERY
// =============================================================================

/// Records link traces in the filter and picks out link candidates.
pub(super) struct LinkParser<'a> {
    ctx: RunContext<'a>,
}

impl<'a> LinkParser<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for LinkParser<'_> {
    fn name(&self) -> &'static str {
        "link_parser"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let filter = self.ctx.filter;

        let traces = igd
            .triples
            .iter()
            .filter(|t| {
                igd.link_specs
                    .iter()
                    .any(|spec| !spec.is_empty() && t.predicate.contains(spec.as_str()))
            })
            .map(|t| t.object.as_str())
            .chain(igd.unique.as_deref());
        for trace in traces.filter(|trace| !trace.is_empty()) {
            filter.add(trace);
        }

        igd.link_candidates = igd
            .triples
            .iter()
            .filter(|t| t.object != igd.id && !t.object.is_empty() && filter.test(&t.object))
            .cloned()
            .collect();
        Ok(Some(igd))
    }
}

/// Adds objects already linking to a candidate value as further candidates.
pub(super) struct ReverseLinkChecker<'a> {
    ctx: RunContext<'a>,
}

impl<'a> ReverseLinkChecker<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for ReverseLinkChecker<'_> {
    fn name(&self) -> &'static str {
        "reverse_link_checker"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let mut linkers = BTreeSet::new();
        for candidate in &igd.link_candidates {
            let prefix =
                hexastore::prefix(Permutation::Ops, Namespace::Link, &[candidate.object.as_str()]);
            for edge in self.ctx.store.scan_triples(&prefix, Namespace::Link)? {
                linkers.insert(edge.subject);
            }
        }
        igd.link_candidates.extend(
            linkers
                .into_iter()
                .map(|subject| Triple::new(REVERSE_SUBJECT, REVERSE_PREDICATE, subject)),
        );
        Ok(Some(igd))
    }
}

/// Resolves candidates to link targets, creating anchors where needed.
///
/// In [`Mode::Remove`] anchors are only computed, never written.
pub(super) struct LinkBuilder<'a> {
    ctx: RunContext<'a>,
    mode: Mode,
}

impl<'a> LinkBuilder<'a> {
    pub(super) fn new(ctx: RunContext<'a>, mode: Mode) -> Self {
        Self { ctx, mode }
    }
}

impl Stage<IngestData> for LinkBuilder<'_> {
    fn name(&self) -> &'static str {
        "link_builder"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let mut links_to = BTreeSet::new();
        for candidate in &igd.link_candidates {
            if has_type(self.ctx.store, &candidate.object)? {
                links_to.insert(candidate.object.clone());
            }
        }

        let mut anchors = WriteBatch::new();
        for candidate in &igd.link_candidates {
            let value = candidate.object.as_str();
            if value.is_empty()
                || value == igd.id
                || links_to.contains(value)
                || igd.unique.as_deref() == Some(value)
            {
                continue;
            }
            anchors.insert_triple(&Triple::new(value, IS_A, PROPERTY_LINK), Namespace::Primary);
            links_to.insert(value.to_string());
        }
        if let Some(unique) = &igd.unique {
            anchors.insert_triple(&Triple::new(unique, IS_A, UNIQUE_LINK), Namespace::Primary);
            links_to.insert(unique.clone());
        }
        if self.mode == Mode::Write && !anchors.is_empty() {
            self.ctx.store.apply(&anchors)?;
        }

        igd.link_triples = links_to
            .iter()
            .filter(|target| **target != igd.id)
            .map(|target| Triple::new(&igd.id, REFERENCES, target))
            .collect();
        igd.links_to = links_to;
        Ok(Some(igd))
    }
}

// =============================================================================
// LINK STORAGE
// =============================================================================

/// Writes the link-namespace sextuples of every edge.
pub(super) struct LinkWriter<'a> {
    ctx: RunContext<'a>,
}

impl<'a> LinkWriter<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for LinkWriter<'_> {
    fn name(&self) -> &'static str {
        "link_writer"
    }

    fn process(&mut self, igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let mut batch = WriteBatch::new();
        for edge in &igd.link_triples {
            batch.insert_triple(edge, Namespace::Link);
        }
        if !batch.is_empty() {
            self.ctx.store.apply(&batch)?;
        }
        Ok(Some(igd))
    }
}

/// Deletes recomputed edges plus every stored outgoing edge of the object.
pub(super) struct LinkRemover<'a> {
    ctx: RunContext<'a>,
}

impl<'a> LinkRemover<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for LinkRemover<'_> {
    fn name(&self) -> &'static str {
        "link_remover"
    }

    fn process(&mut self, mut igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let outgoing =
            hexastore::prefix(Permutation::Spo, Namespace::Link, &[igd.id.as_str(), REFERENCES]);
        let mut edges: BTreeSet<Triple> = igd.link_triples.drain(..).collect();
        edges.extend(self.ctx.store.scan_triples(&outgoing, Namespace::Link)?);

        let mut batch = WriteBatch::new();
        for edge in &edges {
            batch.delete_triple(edge, Namespace::Link);
        }
        if !batch.is_empty() {
            self.ctx.store.apply(&batch)?;
        }
        igd.link_triples = edges.into_iter().collect();
        Ok(Some(igd))
    }
}

/// Deletes anchors left without any inbound `references` edge.
pub(super) struct AnchorPruner<'a> {
    ctx: RunContext<'a>,
}

impl<'a> AnchorPruner<'a> {
    pub(super) fn new(ctx: RunContext<'a>) -> Self {
        Self { ctx }
    }
}

impl Stage<IngestData> for AnchorPruner<'_> {
    fn name(&self) -> &'static str {
        "anchor_pruner"
    }

    fn process(&mut self, igd: IngestData) -> Result<Option<IngestData>, HexlinkError> {
        let store = self.ctx.store;
        let mut batch = WriteBatch::new();
        for edge in &igd.link_triples {
            let target = edge.object.as_str();
            let types = store.scan_triples(
                &hexastore::prefix(Permutation::Spo, Namespace::Primary, &[target, IS_A]),
                Namespace::Primary,
            )?;
            if types.is_empty() || !types.iter().all(|t| is_anchor_type(&t.object)) {
                continue;
            }
            let inbound = hexastore::prefix(Permutation::Pos, Namespace::Link, &[REFERENCES, target]);
            if store.count_prefix(&inbound)? > 0 {
                continue;
            }
            tracing::debug!(anchor = target, "pruning unreferenced anchor");
            for anchor in &types {
                batch.delete_triple(anchor, Namespace::Primary);
            }
        }
        if !batch.is_empty() {
            store.apply(&batch)?;
        }
        Ok(Some(igd))
    }
}
