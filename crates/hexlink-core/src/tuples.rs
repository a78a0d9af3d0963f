//! # Flattening
//!
//! Objects are stored as one triple per scalar leaf. The predicate of a
//! leaf is its dot-and-index path from the object root:
//!
//! ```text
//! {"a": {"b": [1, {"c": "x"}]}}   =>   a.b.0 = "1"
//!                                      a.b.1.c = "x"
//! ```
//!
//! Leaves are rendered as strings. Empty objects and arrays produce no
//! leaves. [`unflatten`] is the inverse used when reading objects back:
//! a container whose keys are exactly `0..n` becomes an array, so
//! flatten(unflatten(leaves)) == leaves.

use crate::{JsonObject, Triple};
use serde_json::Value;
use std::collections::BTreeMap;

/// Render a scalar leaf the way it is stored.
#[must_use]
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Flatten an object into `path -> rendered value` leaves, ordered by path.
#[must_use]
pub fn flatten(object: &JsonObject) -> BTreeMap<String, String> {
    let mut leaves = BTreeMap::new();
    for (key, value) in object {
        walk(key.clone(), value, &mut leaves);
    }
    leaves
}

fn walk(path: String, value: &Value, leaves: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(format!("{path}.{key}"), child, leaves);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(format!("{path}.{index}"), child, leaves);
            }
        }
        scalar => {
            leaves.insert(path, render_scalar(scalar));
        }
    }
}

/// One triple per leaf of `object`, with `id` as subject.
#[must_use]
pub fn generate_triples(id: &str, object: &JsonObject) -> Vec<Triple> {
    flatten(object)
        .into_iter()
        .map(|(predicate, value)| Triple::new(id, predicate, value))
        .collect()
}

// =============================================================================
// REASSEMBLY
// =============================================================================

/// Rebuild a nested object from `path -> value` leaves.
#[must_use]
pub fn unflatten<'p>(leaves: impl IntoIterator<Item = (&'p str, &'p str)>) -> JsonObject {
    let mut root = JsonObject::new();
    for (path, value) in leaves {
        insert_path(&mut root, path, value);
    }
    for child in root.values_mut() {
        densify(child);
    }
    root
}

fn insert_path(root: &mut JsonObject, path: &str, value: &str) {
    let mut segments = path.split('.').peekable();
    let mut cursor = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            cursor.insert(segment.to_string(), Value::String(value.to_string()));
            return;
        }
        let entry = cursor
            .entry(segment)
            .or_insert_with(|| Value::Object(JsonObject::new()));
        if !entry.is_object() {
            *entry = Value::Object(JsonObject::new());
        }
        match entry {
            Value::Object(next) => cursor = next,
            _ => return,
        }
    }
}

/// Turn containers keyed exactly `0..n` back into arrays.
fn densify(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for child in map.values_mut() {
                densify(child);
            }
            if is_dense_index(map) {
                let mut slots: Vec<(usize, Value)> = std::mem::take(map)
                    .into_iter()
                    .filter_map(|(key, child)| key.parse().ok().map(|index| (index, child)))
                    .collect();
                slots.sort_by_key(|(index, _)| *index);
                *value = Value::Array(slots.into_iter().map(|(_, child)| child).collect());
            }
        }
        Value::Array(items) => items.iter_mut().for_each(densify),
        _ => {}
    }
}

fn is_dense_index(map: &JsonObject) -> bool {
    if map.is_empty() {
        return false;
    }
    let mut seen = vec![false; map.len()];
    map.keys().all(|key| match key.parse::<usize>() {
        Ok(index) if index < seen.len() && *key == index.to_string() => {
            !std::mem::replace(&mut seen[index], true)
        }
        _ => false,
    })
}

// =============================================================================
// TESTS
// =============================================================================
