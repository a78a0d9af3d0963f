//! # Validation Tier Tests (T0-T3)
//!
//! If ANY tier fails, the store is INVALID.
//!
//! ## Tiers
//! - T0: Storage Integrity
//! - T1: Deterministic Linking
//! - T2: Queries
//! - T3: Multi-Hop Traversal

use hexlink_core::{
    ConfigClassifier, Filter, FilterSpec, HexStore, HexlinkError, JsonObject, MemoryStore,
    StoreConfig, Traversal, TripleStore,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

/// A memory-backed store whose raw keys stay inspectable.
struct Harness {
    keys: Arc<MemoryStore>,
    store: HexStore,
}

/// Lets the harness keep a handle on the keys the store writes.
struct SharedMemory(Arc<MemoryStore>);

impl TripleStore for SharedMemory {
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, HexlinkError> {
        self.0.scan_prefix(prefix)
    }

    fn contains(&self, key: &str) -> Result<bool, HexlinkError> {
        self.0.contains(key)
    }

    fn apply(&self, batch: &hexlink_core::WriteBatch) -> Result<(), HexlinkError> {
        self.0.apply(batch)
    }
}

impl Harness {
    fn new() -> Self {
        let keys = Arc::new(MemoryStore::new());
        let store = HexStore::with_backend(
            SharedMemory(Arc::clone(&keys)),
            ConfigClassifier::with_default_rules().expect("rules"),
            StoreConfig::default(),
        );
        Self { keys, store }
    }

    fn ingest(&self, values: Vec<Value>) {
        self.store.ingest_values(values).expect("ingest");
    }

    fn keys(&self) -> BTreeSet<String> {
        self.keys.snapshot()
    }

    fn links(&self) -> BTreeSet<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with("spol|"))
            .collect()
    }
}

fn student(id: &str, name: &str) -> Value {
    json!({"StudentPersonal": {"RefId": id, "Name": name}})
}

fn group(id: &str, students: &[&str]) -> Value {
    let list: Vec<Value> = students
        .iter()
        .map(|s| json!({"StudentRefId": s}))
        .collect();
    json!({"TeachingGroup": {"RefId": id, "LocalId": "2", "StudentList": list}})
}

fn object(value: Value) -> JsonObject {
    value.as_object().cloned().expect("object literal")
}

fn walk(types: &[&str]) -> Traversal {
    Traversal::new(types.iter().copied())
}

// =============================================================================
// TIER T0: STORAGE INTEGRITY
// =============================================================================

mod t0_storage_integrity {
    use super::*;

    /// T0.1: Every stored triple has all six primary keys.
    #[test]
    fn sextuples_complete() {
        let h = Harness::new();
        h.ingest(vec![student("S1", "Ann")]);

        let keys = h.keys();
        let count = |tag: &str| keys.iter().filter(|k| k.starts_with(tag)).count();
        let spo = count("spo|");
        assert!(spo > 0);
        for tag in ["sop|", "ops|", "osp|", "pso|", "pos|"] {
            assert_eq!(count(tag), spo, "{tag}");
        }
    }

    /// T0.2: Delimiters inside values survive storage.
    #[test]
    fn delimiter_values_round_trip() {
        let h = Harness::new();
        h.ingest(vec![json!({"Note": {"id": "n|1", "Text": "a|b\\c"}})]);

        let found = h
            .store
            .find_by_value("a|b\\c", &FilterSpec::new())
            .expect("find");
        assert_eq!(found["Note"], vec![object(json!({"Note": {"id": "n|1", "Text": "a|b\\c"}}))]);
    }

    /// T0.3: Non-object input is rejected without blocking the rest.
    #[test]
    fn non_object_rejected() {
        let h = Harness::new();
        let err = h
            .store
            .ingest_values(vec![json!("text"), student("S1", "Ann")])
            .expect_err("rejected");

        assert!(matches!(err.root(), HexlinkError::MalformedInput(_)));
        assert!(h.store.find_by_id("S1", &FilterSpec::new()).is_ok());
    }
}

// =============================================================================
// TIER T1: DETERMINISTIC LINKING
// =============================================================================

mod t1_deterministic_linking {
    use super::*;

    /// T1.1: Ingesting the same object twice equals ingesting it once.
    #[test]
    fn idempotent_upsert() {
        let once = Harness::new();
        once.ingest(vec![group("T1", &["S1", "S2"])]);

        let twice = Harness::new();
        twice.ingest(vec![group("T1", &["S1", "S2"])]);
        twice.ingest(vec![group("T1", &["S1", "S2"])]);

        assert_eq!(once.keys(), twice.keys());
    }

    /// T1.2: Removing and re-ingesting restores identical keys.
    #[test]
    fn deterministic_deletion() {
        let h = Harness::new();
        h.ingest(vec![student("S1", "Ann"), group("T1", &["S1"])]);
        let before = h.keys();

        h.store.delete("T1").expect("delete");
        assert!(h.links().is_empty());
        h.ingest(vec![group("T1", &["S1"])]);

        assert_eq!(h.keys(), before);
    }

    /// T1.3: Link edges do not depend on ingest order.
    #[test]
    fn order_independence() {
        let forward = Harness::new();
        forward.ingest(vec![student("S1", "Ann")]);
        forward.ingest(vec![group("T1", &["S1"])]);

        let backward = Harness::new();
        backward.ingest(vec![group("T1", &["S1"])]);
        backward.ingest(vec![student("S1", "Ann")]);

        assert_eq!(forward.links(), backward.links());
        assert_eq!(
            forward.links(),
            BTreeSet::from(["spol|T1|references|S1".to_string()])
        );
    }

    /// T1.4: Deleting every object leaves an empty store.
    #[test]
    fn delete_everything_leaves_nothing() {
        let h = Harness::new();
        h.ingest(vec![
            student("S1", "Ann"),
            student("S2", "Bob"),
            group("T1", &["S1", "S2", "S3"]),
        ]);

        for id in ["T1", "S1", "S2"] {
            h.store.delete(id).expect("delete");
        }
        assert!(h.keys().is_empty(), "left behind: {:?}", h.keys());
    }

    /// T1.5: Keys containing dots are removed even when they collide with a
    /// sibling leaf on reassembly.
    #[test]
    fn dotted_keys_delete_cleanly() {
        let dotted = |value: &str| json!({"X": {"RefId": "R1", "a": value, "a.b": "w"}});

        let h = Harness::new();
        h.ingest(vec![dotted("v")]);
        h.store.delete("R1").expect("delete");
        assert!(h.keys().is_empty(), "left behind: {:?}", h.keys());
        assert!(matches!(
            h.store.find_by_id("R1", &FilterSpec::new()),
            Err(HexlinkError::NotFound(_))
        ));

        let upserted = Harness::new();
        upserted.ingest(vec![dotted("v")]);
        upserted.ingest(vec![dotted("v2")]);
        let fresh = Harness::new();
        fresh.ingest(vec![dotted("v2")]);
        assert_eq!(upserted.keys(), fresh.keys());
    }

    /// T1.6: Anchors are not objects and cannot be deleted.
    #[test]
    fn anchors_not_deletable() {
        let h = Harness::new();
        h.ingest(vec![group("T1", &["S9"])]);

        let err = h.store.delete("S9").expect_err("anchor");
        assert!(matches!(err, HexlinkError::NotFound(_)));
    }
}

// =============================================================================
// TIER T2: QUERIES
// =============================================================================

mod t2_queries {
    use super::*;

    fn populated() -> Harness {
        let h = Harness::new();
        h.ingest(vec![
            student("S1", "Ann"),
            student("S2", "Annabel"),
            group("T1", &["S1", "S2"]),
        ]);
        h
    }

    /// T2.1: Objects come back as stored, without bookkeeping fields.
    #[test]
    fn find_by_id_round_trip() {
        let h = populated();
        let found = h.store.find_by_id("T1", &FilterSpec::new()).expect("find");

        assert_eq!(
            found["TeachingGroup"],
            vec![object(json!({"TeachingGroup": {
                "LocalId": "2",
                "RefId": "T1",
                "StudentList": [{"StudentRefId": "S1"}, {"StudentRefId": "S2"}]
            }}))]
        );
    }

    /// T2.2: Missing ids are errors.
    #[test]
    fn find_by_missing_id() {
        let h = populated();
        let result = h.store.find_by_id("nope", &FilterSpec::new());
        assert!(matches!(result, Err(HexlinkError::NotFound(_))));
    }

    /// T2.3: Type, value and predicate lookups.
    #[test]
    fn lookups() {
        let h = populated();
        let none = FilterSpec::new();

        assert_eq!(h.store.find_by_type("StudentPersonal", &none).expect("type")["StudentPersonal"].len(), 2);
        assert_eq!(h.store.find_by_value("Ann", &none).expect("value")["StudentPersonal"].len(), 2);
        assert_eq!(h.store.find_by_value("Annabel", &none).expect("value")["StudentPersonal"].len(), 1);
        assert_eq!(h.store.find_by_predicate(".StudentRefId", &none).expect("pred")["TeachingGroup"].len(), 1);
        assert!(h.store.find_by_type("Nothing", &none).expect("type").is_empty());
    }

    /// T2.4: Filters must all hold.
    #[test]
    fn filters_conjunctive() {
        let h = populated();
        let spec: FilterSpec = [(
            "StudentPersonal".to_string(),
            vec![Filter::new("Name", "Ann"), Filter::new("RefId", "S1")],
        )]
        .into();
        let found = h.store.find_by_type("StudentPersonal", &spec).expect("find");
        assert_eq!(found["StudentPersonal"].len(), 1);

        let spec: FilterSpec = [(
            "StudentPersonal".to_string(),
            vec![Filter::new("Name", "Ann"), Filter::new("RefId", "S2")],
        )]
        .into();
        let found = h.store.find_by_type("StudentPersonal", &spec).expect("find");
        assert!(found.is_empty());
    }
}

// =============================================================================
// TIER T3: MULTI-HOP TRAVERSAL
// =============================================================================

mod t3_multi_hop {
    use super::*;

    /// T3.1: Student -> teaching group.
    #[test]
    fn student_to_group() {
        let h = Harness::new();
        h.ingest(vec![
            json!({"StudentPersonal": {"RefId": "S1", "Name": "Ann"}}),
            json!({"TeachingGroup": {"RefId": "T1", "StudentRefId": "S1"}}),
        ]);

        let results = h
            .store
            .traversal_with_id("S1", &walk(&["StudentPersonal", "TeachingGroup"]), &FilterSpec::new())
            .expect("traverse");
        assert_eq!(results["TeachingGroup"].len(), 1);
        assert_eq!(
            results["TeachingGroup"][0]["TeachingGroup"]["RefId"],
            json!("T1")
        );

        h.store.delete("T1").expect("delete");
        let results = h
            .store
            .traversal_with_id("S1", &walk(&["StudentPersonal", "TeachingGroup"]), &FilterSpec::new())
            .expect("traverse");
        assert_eq!(results.get("TeachingGroup").map_or(0, Vec::len), 0);
    }

    /// T3.2: Three hops reach classmates.
    #[test]
    fn classmates() {
        let h = Harness::new();
        h.ingest(vec![
            student("S1", "Ann"),
            student("S2", "Bob"),
            student("S3", "Cat"),
            group("T1", &["S1", "S2"]),
        ]);

        let results = h
            .store
            .traversal_with_id(
                "S1",
                &walk(&["StudentPersonal", "TeachingGroup", "StudentPersonal"]),
                &FilterSpec::new(),
            )
            .expect("traverse");
        assert_eq!(results["StudentPersonal"].len(), 2);
    }

    /// T3.3: Value traversal unions every seed.
    #[test]
    fn by_value() {
        let h = Harness::new();
        h.ingest(vec![
            student("S1", "Ann"),
            student("S2", "Ann"),
            group("T1", &["S1"]),
            group("T2", &["S2"]),
        ]);

        let results = h
            .store
            .traversal_with_value("Ann", &walk(&["StudentPersonal", "TeachingGroup"]), &FilterSpec::new())
            .expect("traverse");
        assert_eq!(results["TeachingGroup"].len(), 2);
        assert_eq!(results["StudentPersonal"].len(), 2);
    }

    /// T3.4: Filters prune intermediate hops.
    #[test]
    fn filtered_hop() {
        let h = Harness::new();
        h.ingest(vec![student("S1", "Ann"), group("T1", &["S1"])]);
        let spec: FilterSpec = [(
            "TeachingGroup".to_string(),
            vec![Filter::new("LocalId", "99")],
        )]
        .into();

        let results = h
            .store
            .traversal_with_id("S1", &walk(&["StudentPersonal", "TeachingGroup"]), &spec)
            .expect("traverse");
        assert!(!results.contains_key("TeachingGroup"));
    }

    /// T3.5: More data never shrinks a walk's results.
    #[test]
    fn monotonic_in_ingested_data() {
        let h = Harness::new();
        let classmates = walk(&["StudentPersonal", "TeachingGroup", "StudentPersonal"]);
        h.ingest(vec![student("S1", "Ann"), group("T1", &["S1", "S2"])]);
        let before = h
            .store
            .traversal_with_id("S1", &classmates, &FilterSpec::new())
            .expect("traverse");

        h.ingest(vec![student("S2", "Bob"), group("T2", &["S1"])]);
        let after = h
            .store
            .traversal_with_id("S1", &classmates, &FilterSpec::new())
            .expect("traverse");

        for (object_type, objects) in &before {
            for object in objects {
                assert!(after[object_type].contains(object), "{object_type} lost {object:?}");
            }
        }
        assert!(after["TeachingGroup"].len() > before["TeachingGroup"].len());
    }

    /// T3.6: Later hops never drop matches recorded by earlier ones.
    #[test]
    fn earlier_matches_survive_later_hops() {
        let h = Harness::new();
        h.ingest(vec![student("S1", "Ann"), student("S2", "Bob"), group("T1", &["S1", "S2"])]);
        let ids = |results: &hexlink_core::ResultSet, object_type: &str| -> BTreeSet<String> {
            results
                .get(object_type)
                .into_iter()
                .flatten()
                .filter_map(|o| o[object_type]["RefId"].as_str().map(str::to_string))
                .collect()
        };
        let set = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect::<BTreeSet<_>>();

        let classmates = h
            .store
            .traversal_with_id(
                "S1",
                &walk(&["StudentPersonal", "TeachingGroup", "StudentPersonal"]),
                &FilterSpec::new(),
            )
            .expect("traverse");
        assert_eq!(
            ids(&classmates, "StudentPersonal"),
            set(&["S1", "S2"])
        );
        assert_eq!(ids(&classmates, "TeachingGroup"), set(&["T1"]));

        let dead_end = h
            .store
            .traversal_with_id(
                "S1",
                &walk(&["StudentPersonal", "TeachingGroup", "TeachingGroup"]),
                &FilterSpec::new(),
            )
            .expect("traverse");
        assert_eq!(ids(&dead_end, "StudentPersonal"), set(&["S1"]));
        assert_eq!(ids(&dead_end, "TeachingGroup"), set(&["T1"]));
    }

    /// T3.7: Empty specs are rejected.
    #[test]
    fn empty_spec_rejected() {
        let h = Harness::new();
        let result = h.store.traversal_with_id("S1", &walk(&[]), &FilterSpec::new());
        assert!(matches!(result, Err(HexlinkError::InvalidTraversal(_))));
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

mod persistence {
    use super::*;
    use tempfile::tempdir;

    /// Links still form against objects ingested before a restart.
    #[test]
    fn links_form_across_reopen() {
        let dir = tempdir().expect("tempdir");

        let store = HexStore::open(dir.path()).expect("open");
        store.ingest_values(vec![student("S1", "Ann")]).expect("ingest");
        store.close().expect("close");

        let store = HexStore::open(dir.path()).expect("reopen");
        store
            .ingest_values(vec![json!({"TeachingGroup": {"RefId": "T1", "StudentRefId": "S1"}})])
            .expect("ingest");
        let results = store
            .traversal_with_id("S1", &walk(&["StudentPersonal", "TeachingGroup"]), &FilterSpec::new())
            .expect("traverse");
        assert_eq!(results["TeachingGroup"].len(), 1);
        assert_eq!(store.stats().expect("stats").links, 1);
    }

    /// Files are ingested as streams of values.
    #[test]
    fn ingest_ndjson_file() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("input.json");
        std::fs::write(
            &file,
            "{\"StudentPersonal\":{\"RefId\":\"S1\"}}\n{\"StudentPersonal\":{\"RefId\":\"S2\"}}\n",
        )
        .expect("write");

        let store = HexStore::open(dir.path().join("db")).expect("open");
        assert_eq!(store.ingest_file(&file).expect("ingest"), 2);
        assert!(store.ingest_file(dir.path().join("missing.json")).is_err());
    }
}
