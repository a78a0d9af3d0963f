//! # Object Classification
//!
//! Decides, for a raw JSON object, its declared type, data model, identity,
//! link-spec patterns and unique-key values.
//!
//! The engine only depends on the [`Classifier`] trait. [`ConfigClassifier`]
//! is the stock implementation, driven by a `datatypes.toml` file of
//! `[[classifier]]` rules tried in order:
//!
//! ```toml
//! [[classifier]]
//! data_model = "SIF"
//! required_paths = ["*.RefId"]
//! n3id = "*.RefId"
//! links = ["RefId"]
//! unique = []
//! ```
//!
//! Paths are dotted. `*` matches any object key (or array element) and
//! numeric segments index arrays.

use crate::primitives::{DEFAULT_DATA_MODEL, UNIQUE_SEPARATOR};
use crate::tuples::render_scalar;
use crate::{HexlinkError, JsonObject};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Rules written to a new store when it has no classifier config yet.
pub const DEFAULT_DATATYPES: &str = r#"# Classifiers are tried in order. The first rule whose required paths all
# resolve decides the data model, the id path, the link specs and the
# unique-key paths of an object. Unmatched objects are classified as JSON.

[[classifier]]
data_model = "SIF"
required_paths = ["*.RefId"]
n3id = "*.RefId"
links = ["RefId"]
unique = []

[[classifier]]
data_model = "XAPI"
required_paths = ["actor.name", "verb.id", "object.id"]
n3id = "id"
links = ["actor.name", "object.id"]
unique = []

[[classifier]]
data_model = "Curriculum"
required_paths = ["learning_area", "subject", "stage"]
n3id = "id"
links = ["learning_area", "subject"]
unique = ["learning_area", "subject", "stage"]
"#;

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Metadata assigned to one object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classification {
    /// Declared type (`is-a` value).
    pub object_type: String,
    /// Data model of the matching rule, or `JSON`.
    pub data_model: String,
    /// Identity, if the object declares one.
    pub id: Option<String>,
    /// Substrings marking predicates whose values are link targets.
    pub link_specs: Vec<String>,
    /// Values of the unique-key paths, in rule order.
    pub unique_values: Vec<String>,
}

impl Classification {
    /// Composite unique key, if any unique values were found.
    #[must_use]
    pub fn unique(&self) -> Option<String> {
        if self.unique_values.is_empty() {
            None
        } else {
            Some(self.unique_values.join(UNIQUE_SEPARATOR))
        }
    }
}

/// Assigns classification metadata to raw objects.
pub trait Classifier: Send + Sync {
    fn classify(&self, object: &JsonObject) -> Result<Classification, HexlinkError>;
}

// =============================================================================
// CONFIG-DRIVEN CLASSIFIER
// =============================================================================

/// One `[[classifier]]` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTypeRule {
    pub data_model: String,
    #[serde(default)]
    pub required_paths: Vec<String>,
    #[serde(default)]
    pub n3id: String,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub unique: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DataTypesFile {
    #[serde(default, rename = "classifier")]
    classifiers: Vec<DataTypeRule>,
}

/// Rule-based classifier loaded from TOML.
#[derive(Debug, Clone, Default)]
pub struct ConfigClassifier {
    rules: Vec<DataTypeRule>,
}

impl ConfigClassifier {
    #[must_use]
    pub fn new(rules: Vec<DataTypeRule>) -> Self {
        Self { rules }
    }

    /// Parse rules from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, HexlinkError> {
        let file: DataTypesFile =
            toml::from_str(text).map_err(|e| HexlinkError::ConfigError(e.to_string()))?;
        for rule in &file.classifiers {
            if rule.data_model.is_empty() {
                return Err(HexlinkError::ConfigError(
                    "classifier rule with empty data_model".to_string(),
                ));
            }
        }
        Ok(Self::new(file.classifiers))
    }

    /// Load rules from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, HexlinkError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HexlinkError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// The stock SIF / xAPI / curriculum rules.
    pub fn with_default_rules() -> Result<Self, HexlinkError> {
        Self::from_toml_str(DEFAULT_DATATYPES)
    }

    #[must_use]
    pub fn rules(&self) -> &[DataTypeRule] {
        &self.rules
    }

    fn matching_rule(&self, object: &JsonObject) -> Option<&DataTypeRule> {
        self.rules.iter().find(|rule| {
            rule.required_paths
                .iter()
                .all(|path| lookup(object, path).is_some_and(|v| !v.is_null()))
        })
    }
}

impl Classifier for ConfigClassifier {
    fn classify(&self, object: &JsonObject) -> Result<Classification, HexlinkError> {
        let object_type = match object.keys().next() {
            Some(key) if object.len() == 1 => Some(key.clone()),
            _ => None,
        };

        let Some(rule) = self.matching_rule(object) else {
            return Ok(Classification {
                object_type: object_type.unwrap_or_else(|| DEFAULT_DATA_MODEL.to_string()),
                data_model: DEFAULT_DATA_MODEL.to_string(),
                ..Classification::default()
            });
        };

        let id = if rule.n3id.is_empty() {
            None
        } else {
            match lookup(object, &rule.n3id) {
                Some(value @ (Value::Object(_) | Value::Array(_))) => {
                    return Err(HexlinkError::ClassificationError(format!(
                        "id path '{}' of {} resolves to a container: {}",
                        rule.n3id, rule.data_model, value
                    )));
                }
                Some(value) => Some(render_scalar(value)).filter(|id| !id.is_empty()),
                None => None,
            }
        };

        let unique_values = rule
            .unique
            .iter()
            .filter_map(|path| lookup(object, path))
            .filter(|value| !value.is_object() && !value.is_array())
            .map(render_scalar)
            .collect();

        Ok(Classification {
            object_type: object_type.unwrap_or_else(|| rule.data_model.clone()),
            data_model: rule.data_model.clone(),
            id,
            link_specs: rule.links.clone(),
            unique_values,
        })
    }
}

// =============================================================================
// PATH LOOKUP
// =============================================================================

/// Resolve a dotted path against an object.
#[must_use]
pub fn lookup<'v>(object: &'v JsonObject, path: &str) -> Option<&'v Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let (head, rest) = segments.split_first()?;
    if *head == "*" {
        object.values().find_map(|child| descend(child, rest))
    } else {
        object.get(*head).and_then(|child| descend(child, rest))
    }
}

fn descend<'v>(node: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(node);
    };
    match node {
        Value::Object(map) if *head == "*" => map.values().find_map(|child| descend(child, rest)),
        Value::Object(map) => map.get(*head).and_then(|child| descend(child, rest)),
        Value::Array(items) if *head == "*" => items.iter().find_map(|child| descend(child, rest)),
        Value::Array(items) => head
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index))
            .and_then(|child| descend(child, rest)),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
