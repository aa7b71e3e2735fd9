//! Keyword validation of decoded values.
//!
//! [`ValueValidator`] checks a `serde_json::Value` against a schema in the
//! arena. Composition is resolved through the arena's cache first; the
//! structural keywords come from the [`FlatSchema`] and the value keywords
//! (length, pattern, bounds, enum, item counts) from every member node, so a
//! constraint declared in any `allOf` branch applies.
//!
//! All per-field failures are pushed onto the caller's list. A `Err` return
//! is reserved for structural problems found while resolving nested schemas.
//!
//! # Example
//!
//! ```rust
//! use formcheck::{FieldPath, MergePolicy, SchemaArena, SchemaNode, ValueValidator};
//! use serde_json::json;
//!
//! let mut arena = SchemaArena::new();
//! let name = arena.insert(SchemaNode::string().min_length(1));
//! let category = arena.insert(SchemaNode::object().property("name", name).required("name"));
//!
//! let validator = ValueValidator::new(&arena, MergePolicy::LastWins);
//! let errors = validator
//!     .validate(category, &json!({"name": ""}), &FieldPath::from("categories"))
//!     .unwrap();
//!
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].path.to_string(), "categories.name");
//! ```

mod array;
mod numeric;
mod object;
mod string;

pub(crate) use object::{missing_required, unexpected_property};

use serde_json::Value;

use crate::error::{ErrorKind, StructuralError, ValidationError};
use crate::path::FieldPath;
use crate::schema::{FlatSchema, MergePolicy, SchemaArena, SchemaId, SchemaNode, SchemaType};

/// Validates JSON values against schemas stored in a [`SchemaArena`].
#[derive(Debug, Clone, Copy)]
pub struct ValueValidator<'a> {
    arena: &'a SchemaArena,
    policy: MergePolicy,
}

impl<'a> ValueValidator<'a> {
    pub fn new(arena: &'a SchemaArena, policy: MergePolicy) -> Self {
        Self { arena, policy }
    }

    /// Returns every per-field error found in `value`.
    pub fn validate(
        &self,
        schema: SchemaId,
        value: &Value,
        path: &FieldPath,
    ) -> Result<Vec<ValidationError>, StructuralError> {
        let mut errors = Vec::new();
        self.check(schema, value, path, &mut errors)?;
        Ok(errors)
    }

    pub(crate) fn check(
        &self,
        schema: SchemaId,
        value: &Value,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), StructuralError> {
        let flat = self.arena.resolve(schema, self.policy)?;
        self.check_flat(&flat, value, path, errors)
    }

    pub(crate) fn check_flat(
        &self,
        flat: &FlatSchema,
        value: &Value,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), StructuralError> {
        let expected = flat.effective_type();

        if value.is_null() {
            if expected.is_some() && !self.members(flat).any(|node| node.nullable) {
                errors.push(type_mismatch(path, expected, value));
            }
            return Ok(());
        }

        if let Some(expected_type) = expected {
            if !type_matches(expected_type, value) {
                errors.push(type_mismatch(path, expected, value));
                return Ok(());
            }
        }

        for node in self.members(flat) {
            check_enum(node, value, path, errors);
            match value {
                Value::String(text) => string::check_string(node, text, path, errors),
                Value::Number(number) => numeric::check_number(node, number, path, errors),
                Value::Array(items) => {
                    array::check_item_count(node, items.len(), path, errors);
                    array::check_unique(node, items, path, errors);
                }
                _ => {}
            }
        }

        match value {
            Value::Object(object) => object::check_object(self, flat, object, path, errors)?,
            Value::Array(items) => {
                if let Some(item_schema) = flat.items {
                    for (index, item) in items.iter().enumerate() {
                        self.check(item_schema, item, &path.index(index), errors)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Byte-length keywords of a streamed binary payload.
    pub(crate) fn check_binary_size(
        &self,
        flat: &FlatSchema,
        size: u64,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        for node in self.members(flat) {
            string::check_length(node, size, "bytes", path, errors);
        }
    }

    /// Array keywords over the occurrences of a repeated form field.
    ///
    /// `count` includes binary occurrences; `values` holds only the decoded ones.
    pub(crate) fn check_collected(
        &self,
        flat: &FlatSchema,
        count: usize,
        values: &[Value],
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) {
        for node in self.members(flat) {
            array::check_item_count(node, count, path, errors);
            array::check_unique(node, values, path, errors);
        }
    }

    pub fn arena(&self) -> &'a SchemaArena {
        self.arena
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    fn members<'f>(&self, flat: &'f FlatSchema) -> impl Iterator<Item = &'a SchemaNode> + 'f
    where
        'a: 'f,
    {
        let arena = self.arena;
        flat.members.iter().filter_map(move |id| arena.get(*id))
    }
}

fn check_enum(
    node: &SchemaNode,
    value: &Value,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    if node.enum_values.is_empty() || node.enum_values.contains(value) {
        return;
    }
    let allowed: Vec<String> = node.enum_values.iter().map(Value::to_string).collect();
    errors.push(
        ValidationError::new(
            path.clone(),
            ErrorKind::FormatViolation,
            format!("value must be one of [{}]", allowed.join(", ")),
        )
        .with_code("enum")
        .with_expected(format!("one of [{}]", allowed.join(", ")))
        .with_got(value.to_string()),
    );
}

pub(crate) fn type_matches(expected: SchemaType, value: &Value) -> bool {
    match expected {
        SchemaType::String => value.is_string(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Array => value.is_array(),
        SchemaType::Object => value.is_object(),
        SchemaType::Number => value.is_number(),
        SchemaType::Integer => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
    }
}

fn type_mismatch(path: &FieldPath, expected: Option<SchemaType>, value: &Value) -> ValidationError {
    let expected = expected.map(SchemaType::as_str).unwrap_or("any");
    ValidationError::new(
        path.clone(),
        ErrorKind::TypeMismatch,
        format!("expected {}", expected),
    )
    .with_expected(expected)
    .with_got(value_type_name(value))
}

/// JSON type name of a value; non-integral numbers are `float`.
pub(crate) fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AdditionalProperties;
    use serde_json::json;

    fn validate(arena: &SchemaArena, id: SchemaId, value: Value) -> Vec<ValidationError> {
        ValueValidator::new(arena, MergePolicy::LastWins)
            .validate(id, &value, &FieldPath::root())
            .unwrap()
    }

    #[test]
    fn type_mismatch_skips_keywords() {
        let mut arena = SchemaArena::new();
        let id = arena.insert(SchemaNode::string().min_length(3));
        let errors = validate(&arena, id, json!(12));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ErrorKind::TypeMismatch);
        assert_eq!(errors[0].got.as_deref(), Some("integer"));
    }

    #[test]
    fn integer_accepts_integral_floats_only() {
        let mut arena = SchemaArena::new();
        let id = arena.insert(SchemaNode::integer());
        assert!(validate(&arena, id, json!(3)).is_empty());
        assert!(validate(&arena, id, json!(3.0)).is_empty());
        assert_eq!(
            validate(&arena, id, json!(3.5))[0].got.as_deref(),
            Some("float")
        );
    }

    #[test]
    fn null_requires_nullable() {
        let mut arena = SchemaArena::new();
        let strict = arena.insert(SchemaNode::string());
        let open = arena.insert(SchemaNode::string().nullable());
        let untyped = arena.insert(SchemaNode::new());

        assert_eq!(validate(&arena, strict, Value::Null).len(), 1);
        assert!(validate(&arena, open, Value::Null).is_empty());
        assert!(validate(&arena, untyped, Value::Null).is_empty());
    }

    #[test]
    fn enum_membership() {
        let mut arena = SchemaArena::new();
        let id = arena.insert(SchemaNode::string().enum_values(vec![json!("a"), json!("b")]));
        assert!(validate(&arena, id, json!("a")).is_empty());

        let errors = validate(&arena, id, json!("c"));
        assert_eq!(errors[0].code, "enum");
        assert_eq!(errors[0].expected.as_deref(), Some("one of [\"a\", \"b\"]"));
    }

    #[test]
    fn keywords_from_every_branch_apply() {
        let mut arena = SchemaArena::new();
        let short = arena.insert(SchemaNode::string().max_length(4));
        let root = arena.insert(SchemaNode::string().all_of(short).min_length(2));

        assert!(validate(&arena, root, json!("abc")).is_empty());
        assert_eq!(validate(&arena, root, json!("a"))[0].code, "min_length");
        assert_eq!(validate(&arena, root, json!("abcde"))[0].code, "max_length");
    }

    #[test]
    fn nested_object_paths() {
        let mut arena = SchemaArena::new();
        let name = arena.insert(SchemaNode::string().min_length(1));
        let category = arena.insert(SchemaNode::object().property("name", name).required("name"));
        let list = arena.insert(SchemaNode::array(category));

        let errors = validate(&arena, list, json!([{"name": "ok"}, {"name": ""}, {}]));
        let paths: Vec<_> = errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["[1].name", "[2].name"]);
        assert_eq!(errors[1].kind, ErrorKind::MissingRequiredProperty);
    }

    #[test]
    fn additional_properties_settings() {
        let mut arena = SchemaArena::new();
        let int = arena.insert(SchemaNode::integer());
        let open = arena.insert(SchemaNode::object());
        let closed =
            arena.insert(SchemaNode::object().additional_properties(AdditionalProperties::Deny));
        let typed = arena
            .insert(SchemaNode::object().additional_properties(AdditionalProperties::Schema(int)));

        let value = json!({"extra": "x"});
        assert!(validate(&arena, open, value.clone()).is_empty());
        assert_eq!(
            validate(&arena, closed, value.clone())[0].kind,
            ErrorKind::UnexpectedProperty
        );
        assert_eq!(
            validate(&arena, typed, value)[0].kind,
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn recursive_schema_validates_nested_levels() {
        let mut arena = SchemaArena::new();
        let node = arena.reserve("Node");
        let children = arena.insert(SchemaNode::array(node));
        let label = arena.insert(SchemaNode::string());
        arena
            .set(
                node,
                SchemaNode::object()
                    .property("label", label)
                    .property("children", children)
                    .required("label"),
            )
            .unwrap();

        let value = json!({"label": "root", "children": [{"label": "a", "children": [{}]}]});
        let errors = validate(&arena, node, value);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.to_string(), "children[0].children[0].label");
    }
}
