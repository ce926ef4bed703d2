//! # Entity Data
//!
//! Callers (customer and loan modules) hand the engine a flat, string-keyed
//! map of scalar values. The engine never mutates it. Lookups distinguish a
//! field that is absent from a field that is present with the wrong type,
//! because evaluators report the two cases differently.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::LceError;

/// A scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A boolean flag.
    Bool(bool),
    /// A numeric amount or count.
    Number(f64),
    /// Free text.
    Text(String),
}

impl FieldValue {
    /// The type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "string",
        }
    }

    /// Render the value as JSON for result details.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::json!(n),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Outcome of a typed field lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The field is present with the expected type.
    Found(T),
    /// The field is absent.
    Missing,
    /// The field is present but holds another type.
    WrongType(&'static str),
}

/// The flat field map describing one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityData(BTreeMap<String, FieldValue>);

impl EntityData {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a field.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Decode entity data from a JSON object.
    ///
    /// Nested objects, arrays and nulls are rejected: entity data is flat.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, LceError> {
        let obj = value
            .as_object()
            .ok_or_else(|| LceError::validation("entity data must be a JSON object"))?;
        let mut map = BTreeMap::new();
        for (key, v) in obj {
            let field = match v {
                serde_json::Value::Bool(b) => FieldValue::Bool(*b),
                serde_json::Value::Number(n) => FieldValue::Number(n.as_f64().ok_or_else(|| {
                    LceError::validation(format!("field {key} is not a finite number"))
                })?),
                serde_json::Value::String(s) => FieldValue::Text(s.clone()),
                _ => {
                    return Err(LceError::validation(format!(
                        "field {key} must be a scalar (number, string or bool)"
                    )))
                }
            };
            map.insert(key.clone(), field);
        }
        Ok(Self(map))
    }

    /// Raw access to a field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Whether the field is present (any type).
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Look up a numeric field.
    pub fn number(&self, key: &str) -> Lookup<f64> {
        match self.0.get(key) {
            None => Lookup::Missing,
            Some(FieldValue::Number(n)) => Lookup::Found(*n),
            Some(other) => Lookup::WrongType(other.type_name()),
        }
    }

    /// Look up a text field.
    pub fn text(&self, key: &str) -> Lookup<&str> {
        match self.0.get(key) {
            None => Lookup::Missing,
            Some(FieldValue::Text(s)) => Lookup::Found(s.as_str()),
            Some(other) => Lookup::WrongType(other.type_name()),
        }
    }

    /// A text field, or `None` when missing, mistyped or blank.
    pub fn text_opt(&self, key: &str) -> Option<&str> {
        match self.text(key) {
            Lookup::Found(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        }
    }

    /// A numeric field, or `None` when missing or mistyped.
    pub fn number_opt(&self, key: &str) -> Option<f64> {
        match self.number(key) {
            Lookup::Found(n) => Some(n),
            _ => None,
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for EntityData {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_lookup_distinguishes_missing_and_wrong_type() {
        let data = EntityData::new().with("amount", 1500.0).with("name", "Ada");
        assert_eq!(data.number("amount"), Lookup::Found(1500.0));
        assert_eq!(data.number("missing"), Lookup::Missing);
        assert_eq!(data.number("name"), Lookup::WrongType("string"));
    }

    #[test]
    fn from_json_accepts_scalars() {
        let data = EntityData::from_json(&json!({"amount": 10, "kyc": true, "name": "x"})).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.get("kyc"), Some(&FieldValue::Bool(true)));
        assert_eq!(data.number_opt("amount"), Some(10.0));
    }

    #[test]
    fn from_json_rejects_nested_values() {
        let err = EntityData::from_json(&json!({"address": {"city": "x"}})).unwrap_err();
        assert!(format!("{err}").contains("address"));
        assert!(EntityData::from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn serde_is_untagged() {
        let data: EntityData = serde_json::from_str(r#"{"a": 1.5, "b": "t", "c": false}"#).unwrap();
        assert_eq!(data.get("a"), Some(&FieldValue::Number(1.5)));
        assert_eq!(data.get("b"), Some(&FieldValue::Text("t".into())));
        assert_eq!(data.get("c"), Some(&FieldValue::Bool(false)));
    }

    #[test]
    fn text_opt_skips_blank() {
        let data = EntityData::new().with("name", "  ");
        assert_eq!(data.text_opt("name"), None);
    }
}
