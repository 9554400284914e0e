//! Metadata filters for search and deletion.
//!
//! JSON form: `{"a": 2}` is equality, `{"a": {"in": [1, 2]}}` is membership.
//! All keys must match.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use askme_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    In {
        #[serde(rename = "in")]
        values: Vec<Value>,
    },
    Eq(Value),
}

impl Condition {
    fn matches(&self, actual: Option<&Value>) -> bool {
        match (self, actual) {
            (Condition::Eq(expected), Some(v)) => v == expected,
            (Condition::In { values }, Some(v)) => values.contains(v),
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct MetadataFilter {
    conditions: BTreeMap<String, Condition>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), Condition::Eq(value.into()));
        self
    }

    /// Require `metadata[key]` to be one of `values`.
    pub fn one_of(mut self, key: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.insert(key.into(), Condition::In { values });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Evaluate the filter against a row's metadata object.
    pub fn matches(&self, metadata: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(key, cond)| cond.matches(metadata.get(key)))
    }
}

impl TryFrom<Value> for MetadataFilter {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(Error::InvalidRequest(format!(
                    "metadata filter must be an object, got {}",
                    other
                )))
            }
        };

        let mut conditions = BTreeMap::new();
        for (key, raw) in map {
            let cond = match raw {
                Value::Object(mut inner) if inner.len() == 1 && inner.contains_key("in") => {
                    match inner.remove("in") {
                        Some(Value::Array(values)) => Condition::In { values },
                        _ => {
                            return Err(Error::InvalidRequest(format!(
                                "filter \"{}\": \"in\" expects an array",
                                key
                            )))
                        }
                    }
                }
                other => Condition::Eq(other),
            };
            conditions.insert(key, cond);
        }
        Ok(Self { conditions })
    }
}

impl From<MetadataFilter> for Value {
    fn from(filter: MetadataFilter) -> Self {
        let map = filter
            .conditions
            .into_iter()
            .map(|(k, c)| {
                let v = match c {
                    Condition::Eq(v) => v,
                    Condition::In { values } => serde_json::json!({ "in": values }),
                };
                (k, v)
            })
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_equality_and_membership() {
        let filter: MetadataFilter =
            serde_json::from_value(json!({"a": 2, "b": {"in": ["x", "y"]}})).unwrap();

        assert!(filter.matches(&json!({"a": 2, "b": "y", "c": true})));
        assert!(!filter.matches(&json!({"a": 2, "b": "z"})));
        assert!(!filter.matches(&json!({"a": 1, "b": "x"})));
        assert!(!filter.matches(&json!({"b": "x"})));
    }

    #[test]
    fn test_nested_objects_are_equality() {
        let filter: MetadataFilter =
            serde_json::from_value(json!({"loc": {"page": 1}})).unwrap();
        assert!(filter.matches(&json!({"loc": {"page": 1}})));
        assert!(!filter.matches(&json!({"loc": {"page": 2}})));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = serde_json::from_value::<MetadataFilter>(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }

    #[test]
    fn test_in_requires_array() {
        assert!(serde_json::from_value::<MetadataFilter>(json!({"a": {"in": 3}})).is_err());
    }

    #[test]
    fn test_builder_round_trips_through_json() {
        let filter = MetadataFilter::new()
            .eq("filename", "cats.txt")
            .one_of("chunkIndex", vec![json!(0), json!(1)]);
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value, json!({"chunkIndex": {"in": [0, 1]}, "filename": "cats.txt"}));
        assert_eq!(serde_json::from_value::<MetadataFilter>(value).unwrap(), filter);
    }
}
