//! # Query Layer
//!
//! Point and prefix lookups over the primary hexastore. Each query picks the
//! ordering whose leading field is the one being searched:
//!
//! | Query               | Scan                     |
//! |---------------------|--------------------------|
//! | `find_by_id`        | `sop|<id>|`              |
//! | `find_by_type`      | `pos|is-a|<type>|`       |
//! | `find_by_value`     | `osp|<term>` (prefix)    |
//! | `find_by_predicate` | `pso|<path>` (prefix)    |
//!
//! Every query reassembles matching objects and routes them through
//! [`results::assemble`].

use crate::hexastore::{self, Namespace, Permutation};
use crate::primitives::{IS_A, UNIQUE, is_anchor_type};
use crate::storage::TripleStore;
use crate::tuples::unflatten;
use crate::{FilterSpec, HexlinkError, JsonObject, ResultSet, results};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// STORED OBJECTS
// =============================================================================

/// An object reassembled from its primary triples.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub id: String,
    /// Reassembled fields, including `is-a` (declared type) and `unique`.
    pub fields: JsonObject,
    /// Every `is-a` value asserted for the id, in key order.
    pub types: Vec<String>,
}

impl StoredObject {
    /// The declared type: a real type if one exists, otherwise an anchor type.
    #[must_use]
    pub fn declared_type(&self) -> Option<&str> {
        self.types
            .iter()
            .find(|t| !is_anchor_type(t))
            .or_else(|| self.types.first())
            .map(String::as_str)
    }

    /// Whether the id exists only as a link anchor.
    #[must_use]
    pub fn is_anchor_only(&self) -> bool {
        self.types.iter().all(|t| is_anchor_type(t))
    }

    /// The stored composite unique key, if any.
    #[must_use]
    pub fn unique(&self) -> Option<String> {
        self.fields
            .get(UNIQUE)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Reassemble the object stored under `id`.
pub fn load_object(store: &dyn TripleStore, id: &str) -> Result<StoredObject, HexlinkError> {
    let triples = store.scan_triples(
        &hexastore::prefix(Permutation::Sop, Namespace::Primary, &[id]),
        Namespace::Primary,
    )?;
    if triples.is_empty() {
        return Err(HexlinkError::NotFound(id.to_string()));
    }

    let mut types = Vec::new();
    let mut leaves = BTreeMap::new();
    for triple in triples {
        if triple.predicate == IS_A {
            types.push(triple.object);
        } else {
            leaves.insert(triple.predicate, triple.object);
        }
    }

    let mut object = StoredObject {
        id: id.to_string(),
        fields: unflatten(leaves.iter().map(|(p, o)| (p.as_str(), o.as_str()))),
        types,
    };
    if let Some(object_type) = object.declared_type().map(str::to_string) {
        object.fields.insert(IS_A.to_string(), object_type.into());
    }
    Ok(object)
}

/// Load each id, skipping ids removed since they were collected.
fn load_all(
    store: &dyn TripleStore,
    ids: BTreeSet<String>,
) -> Result<Vec<JsonObject>, HexlinkError> {
    let mut objects = Vec::with_capacity(ids.len());
    for id in ids {
        match load_object(store, &id) {
            Ok(object) => objects.push(object.fields),
            Err(HexlinkError::NotFound(_)) => {
                tracing::warn!(id = %id, "object vanished during query");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(objects)
}

fn subjects(
    store: &dyn TripleStore,
    prefix: &str,
    keep: impl Fn(&crate::Triple) -> bool,
) -> Result<BTreeSet<String>, HexlinkError> {
    Ok(store
        .scan_triples(prefix, Namespace::Primary)?
        .into_iter()
        .filter(|t| keep(t))
        .map(|t| t.subject)
        .collect())
}

// =============================================================================
// QUERIES
// =============================================================================

/// The object with identity `id`. A missing id is an error.
pub fn find_by_id(
    store: &dyn TripleStore,
    id: &str,
    spec: &FilterSpec,
) -> Result<ResultSet, HexlinkError> {
    let object = load_object(store, id)?;
    results::assemble([object.fields], spec)
}

/// Every object asserted to be of `object_type`.
pub fn find_by_type(
    store: &dyn TripleStore,
    object_type: &str,
    spec: &FilterSpec,
) -> Result<ResultSet, HexlinkError> {
    let ids = subjects(
        store,
        &hexastore::prefix(Permutation::Pos, Namespace::Primary, &[IS_A, object_type]),
        |_| true,
    )?;
    results::assemble(load_all(store, ids)?, spec)
}

/// Every object holding a value that starts with `term`.
pub fn find_by_value(
    store: &dyn TripleStore,
    term: &str,
    spec: &FilterSpec,
) -> Result<ResultSet, HexlinkError> {
    let ids = value_subjects(store, term)?;
    results::assemble(load_all(store, ids)?, spec)
}

/// Ids of every subject holding a value that starts with `term`.
pub(crate) fn value_subjects(
    store: &dyn TripleStore,
    term: &str,
) -> Result<BTreeSet<String>, HexlinkError> {
    subjects(
        store,
        &hexastore::open_prefix(Permutation::Osp, Namespace::Primary, &[], term),
        |_| true,
    )
}

/// Every object with a predicate path matching `path`.
///
/// A path starting with `.` matches at any depth: the predicate must end
/// with it or contain it followed by a further segment. Otherwise the path
/// is a prefix of the predicate.
///
/// The `.` form has no fixed leading segment to seek to, so it reads the
/// whole `pso` range: cost is linear in the number of stored triples. The
/// plain form is a bounded prefix scan.
pub fn find_by_predicate(
    store: &dyn TripleStore,
    path: &str,
    spec: &FilterSpec,
) -> Result<ResultSet, HexlinkError> {
    let ids = if path.starts_with('.') {
        let nested = format!("{path}.");
        subjects(
            store,
            &hexastore::prefix(Permutation::Pso, Namespace::Primary, &[]),
            |t| t.predicate.ends_with(path) || t.predicate.contains(&nested),
        )?
    } else {
        subjects(
            store,
            &hexastore::open_prefix(Permutation::Pso, Namespace::Primary, &[], path),
            |_| true,
        )?
    };
    results::assemble(load_all(store, ids)?, spec)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hexastore::Namespace;
    use crate::storage::{MemoryStore, WriteBatch};
    use crate::{Filter, Triple};
    use serde_json::json;

    fn store_with(triples: &[(&str, &str, &str)]) -> MemoryStore {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for (s, p, o) in triples {
            batch.insert_triple(&Triple::new(*s, *p, *o), Namespace::Primary);
        }
        store.apply(&batch).expect("apply");
        store
    }

    fn school() -> MemoryStore {
        store_with(&[
            ("S1", "is-a", "StudentPersonal"),
            ("S1", "StudentPersonal.RefId", "S1"),
            ("S1", "StudentPersonal.Name.FamilyName", "Smith"),
            ("S2", "is-a", "StudentPersonal"),
            ("S2", "StudentPersonal.RefId", "S2"),
            ("S2", "StudentPersonal.Name.FamilyName", "Smithers"),
            ("T1", "is-a", "TeachingGroup"),
            ("T1", "TeachingGroup.StudentList.0.StudentRefId", "S1"),
            ("T1", "TeachingGroup.StudentList.1.StudentRefId", "S2"),
            ("V", "is-a", "Property.Link"),
        ])
    }

    #[test]
    fn find_by_id_reassembles_object() {
        let results = find_by_id(&school(), "T1", &FilterSpec::new()).expect("find");

        assert_eq!(
            serde_json::Value::Object(results["TeachingGroup"][0].clone()),
            json!({"TeachingGroup": {"StudentList": [
                {"StudentRefId": "S1"},
                {"StudentRefId": "S2"}
            ]}})
        );
    }

    #[test]
    fn find_by_missing_id_is_error() {
        let result = find_by_id(&school(), "nope", &FilterSpec::new());
        assert!(matches!(result, Err(HexlinkError::NotFound(_))));
    }

    #[test]
    fn anchor_only_id_yields_empty_result() {
        let results = find_by_id(&school(), "V", &FilterSpec::new()).expect("find");
        assert!(results.is_empty());

        let object = load_object(&school(), "V").expect("load");
        assert!(object.is_anchor_only());
    }

    #[test]
    fn real_type_preferred_over_anchor() {
        let store = store_with(&[
            ("S1", "is-a", "Property.Link"),
            ("S1", "is-a", "StudentPersonal"),
            ("S1", "StudentPersonal.RefId", "S1"),
        ]);
        let object = load_object(&store, "S1").expect("load");

        assert_eq!(object.declared_type(), Some("StudentPersonal"));
        assert!(!object.is_anchor_only());
    }

    #[test]
    fn find_by_type_with_filter() {
        let spec: FilterSpec = [(
            "StudentPersonal".to_string(),
            vec![Filter::new("FamilyName", "Smith")],
        )]
        .into();
        let results = find_by_type(&school(), "StudentPersonal", &spec).expect("find");

        assert_eq!(results["StudentPersonal"].len(), 1);
    }

    #[test]
    fn find_by_value_matches_prefix() {
        let results = find_by_value(&school(), "Smith", &FilterSpec::new()).expect("find");
        assert_eq!(results["StudentPersonal"].len(), 2);

        let results = find_by_value(&school(), "Smithers", &FilterSpec::new()).expect("find");
        assert_eq!(results["StudentPersonal"].len(), 1);
    }

    #[test]
    fn find_by_predicate_prefix_and_suffix() {
        let by_prefix =
            find_by_predicate(&school(), "TeachingGroup.StudentList", &FilterSpec::new())
                .expect("find");
        assert_eq!(by_prefix["TeachingGroup"].len(), 1);

        let by_suffix = find_by_predicate(&school(), ".FamilyName", &FilterSpec::new())
            .expect("find");
        assert_eq!(by_suffix["StudentPersonal"].len(), 2);

        let by_parent = find_by_predicate(&school(), ".Name", &FilterSpec::new()).expect("find");
        assert_eq!(by_parent["StudentPersonal"].len(), 2);

        let none = find_by_predicate(&school(), "Nothing", &FilterSpec::new()).expect("find");
        assert!(none.is_empty());
    }
}
