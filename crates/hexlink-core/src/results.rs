//! # Results Assembly
//!
//! Shapes reassembled objects for callers: applies the per-type
//! [`FilterSpec`], strips bookkeeping fields and groups by declared type.

use crate::primitives::{IS_A, UNIQUE};
use crate::tuples::flatten;
use crate::{Filter, FilterSpec, HexlinkError, JsonObject, ResultSet};

/// Whether every filter is satisfied by some flattened leaf of `object`.
///
/// A leaf satisfies a filter when its path contains the filter predicate
/// and its value equals the target value. No filters means a pass.
#[must_use]
pub fn matches_filters(object: &JsonObject, filters: &[Filter]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let leaves = flatten(object);
    filters.iter().all(|filter| {
        leaves.iter().any(|(path, value)| {
            path.contains(filter.predicate.as_str()) && *value == filter.target_value
        })
    })
}

/// Remove the `is-a` and `unique` bookkeeping fields.
pub fn strip_bookkeeping(object: &mut JsonObject) {
    object.shift_remove(IS_A);
    object.shift_remove(UNIQUE);
}

/// Filter, strip and group reassembled objects.
///
/// Every object must carry its `is-a` field; objects left empty by
/// stripping (pure anchors) are dropped.
pub fn assemble(
    objects: impl IntoIterator<Item = JsonObject>,
    spec: &FilterSpec,
) -> Result<ResultSet, HexlinkError> {
    let mut results = ResultSet::new();
    for mut object in objects {
        let object_type = object
            .get(IS_A)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                HexlinkError::MalformedInput(format!("stored object has no '{IS_A}' field"))
            })?;

        if let Some(filters) = spec.get(&object_type) {
            if !matches_filters(&object, filters) {
                continue;
            }
        }

        strip_bookkeeping(&mut object);
        if object.is_empty() {
            continue;
        }
        results.entry(object_type).or_default().push(object);
    }
    Ok(results)
}

/// Union `other` into `into`, skipping objects already present.
pub fn merge(into: &mut ResultSet, other: ResultSet) {
    for (object_type, objects) in other {
        let bucket = into.entry(object_type).or_default();
        for object in objects {
            if !bucket.contains(&object) {
                bucket.push(object);
            }
        }
    }
}

/// Total number of objects across all types.
#[must_use]
pub fn count(results: &ResultSet) -> usize {
    results.values().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn object(value: Value) -> JsonObject {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn filters_require_every_pair() {
        let obj = object(json!({"TeachingGroup": {"LocalId": "2", "SchoolYear": "2018"}}));

        assert!(matches_filters(&obj, &[]));
        assert!(matches_filters(&obj, &[Filter::new("LocalId", "2")]));
        assert!(matches_filters(
            &obj,
            &[Filter::new("LocalId", "2"), Filter::new("SchoolYear", "2018")]
        ));
        assert!(!matches_filters(
            &obj,
            &[Filter::new("LocalId", "2"), Filter::new("SchoolYear", "2019")]
        ));
    }

    #[test]
    fn assemble_strips_groups_and_drops_anchors() {
        let objects = vec![
            object(json!({"is-a": "StudentPersonal", "StudentPersonal": {"RefId": "S1"}})),
            object(json!({"is-a": "Property.Link"})),
            object(json!({"is-a": "Unique.Link", "unique": "x"})),
        ];

        let results = assemble(objects, &FilterSpec::new()).expect("assemble");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results["StudentPersonal"],
            vec![object(json!({"StudentPersonal": {"RefId": "S1"}}))]
        );
    }

    #[test]
    fn assemble_applies_type_filters_only_to_their_type() {
        let objects = vec![
            object(json!({"is-a": "A", "v": "1"})),
            object(json!({"is-a": "A", "v": "2"})),
            object(json!({"is-a": "B", "v": "3"})),
        ];
        let spec: FilterSpec = [("A".to_string(), vec![Filter::new("v", "2")])].into();

        let results = assemble(objects, &spec).expect("assemble");
        assert_eq!(count(&results), 2);
        assert_eq!(results["A"], vec![object(json!({"v": "2"}))]);
    }

    #[test]
    fn untyped_object_rejected() {
        let result = assemble(vec![object(json!({"v": "1"}))], &FilterSpec::new());
        assert!(matches!(result, Err(HexlinkError::MalformedInput(_))));
    }

    #[test]
    fn merge_deduplicates() {
        let mut a = ResultSet::new();
        a.insert("T".into(), vec![object(json!({"x": "1"}))]);
        let mut b = ResultSet::new();
        b.insert("T".into(), vec![object(json!({"x": "1"})), object(json!({"x": "2"}))]);

        merge(&mut a, b);
        assert_eq!(a["T"].len(), 2);
    }
}
