//! # Property-Based Tests
//!
//! Codec, link filter and flattening invariants checked with proptest.

use hexlink_core::hexastore::{self, Namespace, Permutation, decode};
use hexlink_core::tuples::{flatten, unflatten};
use hexlink_core::{ConfigClassifier, HexStore, JsonObject, ScalableBloomFilter, Triple};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Field values biased towards the delimiter and escape characters.
fn field() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9.\\-]{0,12}",
        "[a-z|\\\\]{0,8}",
        any::<String>(),
    ]
}

fn triple() -> impl Strategy<Value = Triple> {
    (field(), field(), field()).prop_map(|(s, p, o)| Triple::new(s, p, o))
}

/// Plain identifier keys: flattening these is lossless.
fn plain_key() -> BoxedStrategy<String> {
    "[a-zA-Z]{1,6}".boxed()
}

/// Keys that collide on reassembly: dotted paths and array-like indices.
fn awkward_key() -> BoxedStrategy<String> {
    prop_oneof![
        "[a-z]{1,4}",
        "[a-z]{1,3}(\\.[a-z]{1,3}){1,2}",
        "[0-9]{1,2}",
        "[a-z.]{1,5}",
    ]
    .boxed()
}

/// Nested JSON without empty containers (those produce no leaves).
fn json_value(key: BoxedStrategy<String>) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        "[a-zA-Z0-9 ]{0,8}".prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        Just(Value::Null),
    ];
    leaf.prop_recursive(3, 24, 4, move |inner| {
        prop_oneof![
            vec(inner.clone(), 1..4).prop_map(Value::Array),
            btree_map(key.clone(), inner, 1..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn json_object(key: BoxedStrategy<String>) -> impl Strategy<Value = JsonObject> {
    btree_map(key.clone(), json_value(key), 1..4).prop_map(|m| m.into_iter().collect())
}

proptest! {
    /// Every key of a sextuple decodes back to the original triple.
    #[test]
    fn codec_round_trip(t in triple()) {
        for ns in [Namespace::Primary, Namespace::Link] {
            for key in hexastore::encode(&t, ns) {
                let (decoded_ns, decoded) = decode(&key).expect("decode");
                prop_assert_eq!(decoded_ns, ns);
                prop_assert_eq!(&decoded, &t);
            }
        }
    }

    /// A subject prefix matches exactly the keys of triples with that subject.
    #[test]
    fn subject_prefix_is_exact(a in triple(), b in triple()) {
        let prefix = hexastore::prefix(Permutation::Spo, Namespace::Primary, &[a.subject.as_str()]);
        let key_b = hexastore::key(Permutation::Spo, Namespace::Primary, &b);
        prop_assert_eq!(key_b.starts_with(&prefix), a.subject == b.subject);
    }

    /// Escaping preserves prefixes, so value prefix scans stay correct.
    #[test]
    fn escaping_preserves_prefixes(value in field(), cut in 0usize..16) {
        let split = value
            .char_indices()
            .map(|(i, _)| i)
            .nth(cut)
            .unwrap_or(value.len());
        let head = &value[..split];
        prop_assert!(hexastore::escape(&value).starts_with(hexastore::escape(head).as_ref()));
    }

    /// Everything added to the filter tests positive.
    #[test]
    fn filter_has_no_false_negatives(values in vec(any::<String>(), 1..300)) {
        let mut filter = ScalableBloomFilter::new(0.01, 32);
        for value in &values {
            filter.add(value);
        }
        for value in &values {
            prop_assert!(filter.test(value));
        }
    }

    /// Reassembling flattened leaves and flattening again is stable.
    #[test]
    fn flatten_unflatten_stable(object in json_object(plain_key())) {
        let leaves = flatten(&object);
        let rebuilt = unflatten(leaves.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        prop_assert_eq!(flatten(&rebuilt), leaves);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Ingesting an object and deleting it leaves no key behind.
    #[test]
    fn ingest_then_delete_leaves_nothing(fields in json_object(awkward_key())) {
        let store = HexStore::in_memory(ConfigClassifier::with_default_rules().expect("rules"));
        let mut body = fields;
        body.insert("RefId".to_string(), Value::from("R1"));
        store.ingest_values(vec![json!({ "Doc": body })]).expect("ingest");

        store.delete("R1").expect("delete");
        let stats = store.stats().expect("stats");
        prop_assert_eq!(stats.triples, 0);
        prop_assert_eq!(stats.links, 0);
    }
}

