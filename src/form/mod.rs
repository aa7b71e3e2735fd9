//! The logical object rebuilt from a multipart body.
//!
//! Parts are validated one at a time by [`PartValidator`] and folded into a
//! [`FormData`] by [`FormAggregator`], which also checks object-level
//! constraints once the body is exhausted.

mod aggregate;
mod part;

pub use aggregate::{aggregate, FormAggregator};
pub use part::{PartOutcome, PartValidator};

use indexmap::IndexMap;
use serde_json::{json, Value};

/// The validated value of one part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartValue {
    /// An opaque payload; only its size is kept.
    Binary {
        filename: Option<String>,
        content_type: String,
        size: u64,
    },
    /// A decoded text or JSON payload.
    Value(Value),
}

impl PartValue {
    pub fn is_binary(&self) -> bool {
        matches!(self, PartValue::Binary { .. })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PartValue::Value(value) => Some(value),
            PartValue::Binary { .. } => None,
        }
    }

    /// JSON rendering; binary payloads become a metadata object.
    pub fn to_json(&self) -> Value {
        match self {
            PartValue::Value(value) => value.clone(),
            PartValue::Binary {
                filename,
                content_type,
                size,
            } => json!({
                "filename": filename,
                "contentType": content_type,
                "size": size,
            }),
        }
    }
}

/// Parts grouped by name, in order of first appearance.
///
/// # Example
///
/// ```rust
/// use formcheck::{FormData, PartValue};
/// use serde_json::json;
///
/// let mut form = FormData::new();
/// form.push("tag", PartValue::Value(json!("a")));
/// form.push("tag", PartValue::Value(json!("b")));
///
/// assert_eq!(form.get_all("tag").len(), 2);
/// assert_eq!(form.to_json(), json!({"tag": ["a", "b"]}));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: IndexMap<String, Vec<PartValue>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: PartValue) {
        self.fields.entry(name.into()).or_default().push(value);
    }

    /// The first occurrence of `name`.
    pub fn get(&self, name: &str) -> Option<&PartValue> {
        self.fields.get(name).and_then(|values| values.first())
    }

    pub fn get_all(&self, name: &str) -> &[PartValue] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PartValue])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A name seen once maps to its value, a repeated name to an array.
    pub fn to_json(&self) -> Value {
        let object = self
            .fields
            .iter()
            .map(|(name, values)| {
                let value = match values.as_slice() {
                    [single] => single.to_json(),
                    many => Value::Array(many.iter().map(PartValue::to_json).collect()),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(object)
    }
}
