//! # Ingest and Removal Pipelines
//!
//! Ingest turns raw JSON objects into primary triples plus `references`
//! link edges:
//!
//! ```text
//! classify -> object_remover -> tuple_generator -> triple_writer
//!          -> link_parser -> reverse_link_checker -> link_builder
//!          -> link_writer -> audit
//! ```
//!
//! Removal re-derives an object from storage and replays the same
//! derivation, deleting what ingest would have written:
//!
//! ```text
//! classify -> tuple_generator -> link_parser -> reverse_link_checker
//!          -> link_builder -> link_remover -> triple_remover
//!          -> anchor_pruner -> audit
//! ```
//!
//! Both run on [`Pipeline`]; every stage sees the same [`RunContext`].

mod stages;

use crate::audit::{self, AuditLevel};
use crate::classify::Classifier;
use crate::link_filter::LinkFilter;
use crate::pipeline::Pipeline;
use crate::primitives::{IS_A, UNIQUE};
use crate::query;
use crate::results::strip_bookkeeping;
use crate::storage::TripleStore;
use crate::{HexlinkError, JsonObject, Triple};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io::Read;

use stages::{
    AnchorPruner, Classify, LinkBuilder, LinkParser, LinkRemover, LinkWriter, ObjectRemover,
    ReverseLinkChecker, TripleWriter, TupleGenerator,
};

// =============================================================================
// PIPELINE DATA
// =============================================================================

/// Identity fixed from storage when an object is being removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub object_type: String,
    pub unique: Option<String>,
}

/// The record carried through every ingest and removal stage.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IngestData {
    /// Object being stored; gains `is-a` and `unique` during classification.
    pub raw: JsonObject,
    pub id: String,
    pub object_type: String,
    pub data_model: String,
    pub link_specs: Vec<String>,
    pub unique: Option<String>,
    /// One triple per flattened leaf.
    pub triples: Vec<Triple>,
    /// Triples (or reverse-link markers) whose object may be a link target.
    pub link_candidates: Vec<Triple>,
    /// Resolved link targets.
    pub links_to: BTreeSet<String>,
    /// `references` edges out of this object.
    pub link_triples: Vec<Triple>,
    /// Identity pinned by the removal source.
    pub pinned: Option<Identity>,
}

impl IngestData {
    #[must_use]
    pub fn new(raw: JsonObject) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    /// A stored object re-entering the pipeline for removal.
    #[must_use]
    pub fn restored(raw: JsonObject, identity: Identity) -> Self {
        Self {
            raw,
            pinned: Some(identity),
            ..Self::default()
        }
    }
}

/// Collaborators shared by every stage of one run.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub store: &'a dyn TripleStore,
    pub filter: &'a dyn LinkFilter,
    pub classifier: &'a dyn Classifier,
    pub audit: AuditLevel,
}

/// Whether derived triples are being written or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Write,
    Remove,
}

// =============================================================================
// INGEST
// =============================================================================

/// Ingest every object produced by `source`.
///
/// Returns the number of objects that completed the pipeline. Objects
/// rejected by a non-fatal error are skipped; the first error is still
/// returned once the run has drained.
pub fn run_ingest<'a, I>(ctx: RunContext<'a>, source: I) -> Result<usize, HexlinkError>
where
    I: IntoIterator<Item = Result<JsonObject, HexlinkError>>,
    I::IntoIter: Send + 'a,
{
    let level = ctx.audit;
    Pipeline::new("ingest")
        .stage(Classify::new(ctx))
        .stage(ObjectRemover::new(ctx))
        .stage(TupleGenerator)
        .stage(TripleWriter::new(ctx, Mode::Write))
        .stage(LinkParser::new(ctx))
        .stage(ReverseLinkChecker::new(ctx))
        .stage(LinkBuilder::new(ctx, Mode::Write))
        .stage(LinkWriter::new(ctx))
        .run(source.into_iter().map(|r| r.map(IngestData::new)), move |igd| {
            audit::record_object(level, "ingested", &igd);
            Ok(())
        })
}

/// Remove the object stored under `id`, with its links and orphaned anchors.
///
/// An id that only exists as a link anchor is reported as not found.
pub fn remove_object(ctx: RunContext<'_>, id: &str) -> Result<(), HexlinkError> {
    let stored = query::load_object(ctx.store, id)?;
    if stored.is_anchor_only() {
        return Err(HexlinkError::NotFound(id.to_string()));
    }

    let identity = Identity {
        id: stored.id.clone(),
        object_type: stored.declared_type().unwrap_or_default().to_string(),
        unique: stored.unique(),
    };
    let mut fields = stored.fields;
    strip_bookkeeping(&mut fields);

    let level = ctx.audit;
    Pipeline::new("remove")
        .stage(Classify::new(ctx))
        .stage(TupleGenerator)
        .stage(LinkParser::new(ctx))
        .stage(ReverseLinkChecker::new(ctx))
        .stage(LinkBuilder::new(ctx, Mode::Remove))
        .stage(LinkRemover::new(ctx))
        .stage(TripleWriter::new(ctx, Mode::Remove))
        .stage(AnchorPruner::new(ctx))
        .run([Ok(IngestData::restored(fields, identity))], move |igd| {
            audit::record_object(level, "removed", &igd);
            Ok(())
        })?;
    Ok(())
}

// =============================================================================
// SOURCES
// =============================================================================

/// Objects from in-memory JSON values. Arrays are expanded one level.
pub fn values_source(values: Vec<Value>) -> impl Iterator<Item = Result<JsonObject, HexlinkError>> + Send {
    values.into_iter().flat_map(expand)
}

/// Objects from a stream of concatenated JSON values (NDJSON, a single
/// object or a JSON array).
///
/// A syntax error ends the stream after reporting it.
pub fn reader_source<'a, R>(reader: R) -> impl Iterator<Item = Result<JsonObject, HexlinkError>> + Send + 'a
where
    R: Read + Send + 'a,
{
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .flat_map(|value| match value {
            Ok(value) => expand(value),
            Err(err) => vec![Err(HexlinkError::MalformedInput(format!(
                "invalid JSON at line {} column {}: {}",
                err.line(),
                err.column(),
                err
            )))],
        })
}

fn expand(value: Value) -> Vec<Result<JsonObject, HexlinkError>> {
    match value {
        Value::Array(items) => items.into_iter().map(into_object).collect(),
        other => vec![into_object(other)],
    }
}

fn into_object(value: Value) -> Result<JsonObject, HexlinkError> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(HexlinkError::MalformedInput(format!(
            "expected a JSON object, found {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether `object` carries bookkeeping fields reserved by the store.
#[must_use]
pub fn has_reserved_fields(object: &JsonObject) -> bool {
    object.contains_key(IS_A) || object.contains_key(UNIQUE)
}

// =============================================================================
// TESTS
// =============================================================================
