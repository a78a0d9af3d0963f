//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Hexlink engine.
//!
//! These values shape the on-disk key layout and the link filter file, so
//! changing any of them is a breaking change for existing stores.
//!
//! ## Primitives
//!
//! 1. **Key Primitive**: the delimiter and escape characters of hexastore keys.
//! 2. **Vocabulary Primitive**: reserved predicates and synthetic anchor types.
//! 3. **Filter Primitive**: sizing defaults for the scalable link filter.

// =============================================================================
// KEY LAYOUT
// =============================================================================

/// Field delimiter inside a hexastore key: `<order>|<f1>|<f2>|<f3>`.
pub const KEY_DELIMITER: char = '|';

/// Escape character for delimiters (and itself) occurring inside a field.
pub const KEY_ESCAPE: char = '\\';

/// Suffix appended to an order tag to place a key in the link namespace.
pub const LINK_MARKER: char = 'l';

// =============================================================================
// RESERVED VOCABULARY
// =============================================================================

/// Predicate asserting the declared type of a subject.
pub const IS_A: &str = "is-a";

/// Bookkeeping field carrying an object's composite unique key.
pub const UNIQUE: &str = "unique";

/// Predicate of every derived link edge.
pub const REFERENCES: &str = "references";

/// Anchor type for a shared value with no real object identity.
pub const PROPERTY_LINK: &str = "Property.Link";

/// Anchor type for an object's composite unique key.
pub const UNIQUE_LINK: &str = "Unique.Link";

/// Subject of candidates recovered by the reverse link checker.
pub const REVERSE_SUBJECT: &str = "reverse";

/// Predicate of candidates recovered by the reverse link checker.
pub const REVERSE_PREDICATE: &str = "link";

/// Type carried by the seed of a traversal before the first type match.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Data model assigned to objects no classifier recognises.
pub const DEFAULT_DATA_MODEL: &str = "JSON";

/// Separator used when joining unique values into one key.
pub const UNIQUE_SEPARATOR: &str = "-";

/// Whether a type name is one of the synthetic anchor types.
#[must_use]
pub fn is_anchor_type(object_type: &str) -> bool {
    object_type == PROPERTY_LINK || object_type == UNIQUE_LINK
}

// =============================================================================
// LINK FILTER
// =============================================================================

/// Target false-positive rate of the link filter.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.01;

/// Number of values the first filter layer is sized for.
pub const DEFAULT_FILTER_CAPACITY: u64 = 10_000;

/// Capacity multiplier applied to each new filter layer.
pub const FILTER_GROWTH_FACTOR: u64 = 2;

/// Error-rate multiplier applied to each new filter layer.
pub const FILTER_TIGHTENING_RATIO: f64 = 0.8;

/// Magic bytes for the link filter file header.
///
/// - File Header = Magic Bytes ("HXSB") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"HXSB";

/// Current link filter file format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// PIPELINES
// =============================================================================

/// Capacity of the hand-off channel between two pipeline stages.
///
/// One item in flight per hand-off keeps every stage in lock step.
pub const HANDOFF_CAPACITY: usize = 1;

// =============================================================================
// STORE LAYOUT
// =============================================================================

/// File name of the redb hexastore inside a store folder.
pub const DATABASE_FILE: &str = "hexastore.redb";

/// Relative path of the persisted link filter inside a store folder.
pub const FILTER_FILE: &str = "sbf/featureLinks.sbf";

/// Relative path of the classifier configuration inside a store folder.
pub const CLASSIFIER_FILE: &str = "config/datatypes.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_types_recognised() {
        assert!(is_anchor_type(PROPERTY_LINK));
        assert!(is_anchor_type(UNIQUE_LINK));
        assert!(!is_anchor_type("StudentPersonal"));
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"HXSB");
    }
}
