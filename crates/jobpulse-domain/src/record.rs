//! Structured record - the output of a successful extraction

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured job record
///
/// An ordered mapping from field name to value. Field order follows the
/// order in which the backend emitted the keys. Values are expected to be
/// a string, a number, or a list of strings, but the record itself does not
/// enforce this; the schema contract and the quality gate do.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredRecord(Map<String, Value>);

impl StructuredRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insertion
    ///
    /// # Examples
    ///
    /// ```
    /// use jobpulse_domain::StructuredRecord;
    /// use serde_json::json;
    ///
    /// let record = StructuredRecord::new()
    ///     .with_field("role_title", json!("Data Engineer"))
    ///     .with_field("skills", json!(["sql", "spark"]));
    /// assert_eq!(record.text("role_title"), Some("Data Engineer"));
    /// assert_eq!(record.list("skills"), Some(vec!["sql", "spark"]));
    /// ```
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Whether the field is present (regardless of its value)
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Get a string field
    pub fn text(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// Get a numeric field
    pub fn number(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_f64)
    }

    /// Get a list field; non-string items are skipped
    pub fn list(&self, field: &str) -> Option<Vec<&str>> {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
    }

    /// Whether the field is present and non-empty
    ///
    /// See [`value_is_non_empty`] for the emptiness rules.
    pub fn is_non_empty(&self, field: &str) -> bool {
        self.0.get(field).map(value_is_non_empty).unwrap_or(false)
    }

    /// Field names in record order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record, returning the underlying JSON object
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Convert to a JSON value
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for StructuredRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Emptiness rule shared by the quality gate and reporting
///
/// - `null` is empty
/// - a string is non-empty iff it is non-blank after trimming
/// - a list is non-empty iff it has at least one element
/// - every other value (numbers, booleans, objects) is non-empty
pub fn value_is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Short JSON type name used in validation messages
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
