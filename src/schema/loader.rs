//! Building arena nodes from OpenAPI schema objects.
//!
//! Only local component references (`#/components/schemas/<Name>`) are
//! supported. A reference becomes a reserved arena slot, so components may
//! refer to each other in any order and recursively.

use serde_json::{Map, Value};

use super::arena::ArenaError;
use super::{AdditionalProperties, SchemaArena, SchemaId, SchemaNode, SchemaType};

const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

/// Composition keywords the validator cannot evaluate. Loading fails rather
/// than validating as if they were absent.
const UNSUPPORTED_KEYWORDS: [&str; 3] = ["oneOf", "anyOf", "not"];

/// Errors that can occur while loading schemas or documents.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "yaml")]
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid schema at {pointer}: {reason}")]
    InvalidSchema { pointer: String, reason: String },

    #[error("unsupported $ref '{0}'")]
    UnsupportedRef(String),

    #[error("unresolved schema references: {0:?}")]
    UnresolvedRefs(Vec<String>),

    #[error("invalid document at {pointer}: {reason}")]
    InvalidDocument { pointer: String, reason: String },

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error("multiple errors while loading document: {0:?}")]
    Multiple(Vec<LoadError>),
}

/// Parses one schema object into the arena and returns its id.
///
/// A bare `$ref` returns the referenced component's id directly; nested
/// schemas are inserted as anonymous nodes. `pointer` is the JSON pointer of
/// `value`, used in error messages.
pub fn parse_schema(
    arena: &mut SchemaArena,
    value: &Value,
    pointer: &str,
) -> Result<SchemaId, LoadError> {
    let object = as_schema_object(value, pointer)?;
    if let Some(reference) = object.get("$ref") {
        return reference_id(arena, reference, pointer);
    }
    let node = parse_node(arena, object, pointer)?;
    Ok(arena.insert(node))
}

/// Parses a schema object into a node without inserting it.
///
/// A `$ref` is turned into a single-branch `allOf`, which is how a named
/// component that merely aliases another one is stored.
pub(crate) fn parse_schema_node(
    arena: &mut SchemaArena,
    value: &Value,
    pointer: &str,
) -> Result<SchemaNode, LoadError> {
    let object = as_schema_object(value, pointer)?;
    if let Some(reference) = object.get("$ref") {
        let target = reference_id(arena, reference, pointer)?;
        return Ok(SchemaNode::new().all_of(target));
    }
    parse_node(arena, object, pointer)
}

fn as_schema_object<'v>(
    value: &'v Value,
    pointer: &str,
) -> Result<&'v Map<String, Value>, LoadError> {
    value
        .as_object()
        .ok_or_else(|| invalid(pointer, "schema must be an object"))
}

fn reference_id(
    arena: &mut SchemaArena,
    reference: &Value,
    pointer: &str,
) -> Result<SchemaId, LoadError> {
    let reference = reference
        .as_str()
        .ok_or_else(|| invalid(pointer, "$ref must be a string"))?;
    let name = reference
        .strip_prefix(COMPONENT_SCHEMA_PREFIX)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| LoadError::UnsupportedRef(reference.to_string()))?;
    Ok(arena.reserve(name))
}

fn parse_node(
    arena: &mut SchemaArena,
    object: &Map<String, Value>,
    pointer: &str,
) -> Result<SchemaNode, LoadError> {
    let mut node = SchemaNode::new();

    match object.get("type") {
        None => {}
        Some(Value::String(name)) => {
            node.schema_type = Some(parse_type(name, pointer)?);
        }
        // OpenAPI 3.1 style `type: [string, "null"]`
        Some(Value::Array(names)) => {
            for name in names {
                match name.as_str() {
                    Some("null") => node.nullable = true,
                    Some(name) if node.schema_type.is_none() => {
                        node.schema_type = Some(parse_type(name, pointer)?);
                    }
                    Some(_) => {
                        return Err(invalid(
                            pointer,
                            "multiple non-null types are not supported",
                        ))
                    }
                    None => return Err(invalid(pointer, "type entries must be strings")),
                }
            }
        }
        Some(_) => return Err(invalid(pointer, "type must be a string or array")),
    }

    if let Some(format) = object.get("format") {
        let format = format
            .as_str()
            .ok_or_else(|| invalid(pointer, "format must be a string"))?;
        node.format = Some(format.to_string());
    }
    if let Some(nullable) = object.get("nullable") {
        node.nullable |= as_bool(nullable, pointer, "nullable")?;
    }

    if let Some(properties) = object.get("properties") {
        let properties = properties
            .as_object()
            .ok_or_else(|| invalid(pointer, "properties must be an object"))?;
        for (name, schema) in properties {
            let child = format!("{}/properties/{}", pointer, escape_pointer(name));
            let id = parse_schema(arena, schema, &child)?;
            node.properties.insert(name.clone(), id);
        }
    }

    if let Some(required) = object.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| invalid(pointer, "required must be an array"))?;
        for name in required {
            let name = name
                .as_str()
                .ok_or_else(|| invalid(pointer, "required entries must be strings"))?;
            node.required.insert(name.to_string());
        }
    }

    if let Some(branches) = object.get("allOf") {
        let branches = branches
            .as_array()
            .ok_or_else(|| invalid(pointer, "allOf must be an array"))?;
        for (i, branch) in branches.iter().enumerate() {
            let child = format!("{}/allOf/{}", pointer, i);
            node.all_of.push(parse_schema(arena, branch, &child)?);
        }
    }

    if let Some(items) = object.get("items") {
        let child = format!("{}/items", pointer);
        node.items = Some(parse_schema(arena, items, &child)?);
    }

    match object.get("additionalProperties") {
        None => {}
        Some(Value::Bool(true)) => node.additional_properties = AdditionalProperties::Allow,
        Some(Value::Bool(false)) => node.additional_properties = AdditionalProperties::Deny,
        Some(schema @ Value::Object(_)) => {
            let child = format!("{}/additionalProperties", pointer);
            let id = parse_schema(arena, schema, &child)?;
            node.additional_properties = AdditionalProperties::Schema(id);
        }
        Some(_) => {
            return Err(invalid(
                pointer,
                "additionalProperties must be a boolean or schema",
            ))
        }
    }

    if let Some(values) = object.get("enum") {
        node.enum_values = values
            .as_array()
            .ok_or_else(|| invalid(pointer, "enum must be an array"))?
            .clone();
    }

    node.min_length = optional_u64(object, "minLength", pointer)?;
    node.max_length = optional_u64(object, "maxLength", pointer)?;
    node.min_items = optional_u64(object, "minItems", pointer)?;
    node.max_items = optional_u64(object, "maxItems", pointer)?;
    if let Some(unique) = object.get("uniqueItems") {
        node.unique_items = as_bool(unique, pointer, "uniqueItems")?;
    }

    if let Some(pattern) = object.get("pattern") {
        let pattern = pattern
            .as_str()
            .ok_or_else(|| invalid(pointer, "pattern must be a string"))?;
        node.pattern = Some(
            super::Pattern::new(pattern)
                .map_err(|e| invalid(pointer, &format!("invalid pattern: {}", e)))?,
        );
    }

    node.minimum = optional_f64(object, "minimum", pointer)?;
    node.maximum = optional_f64(object, "maximum", pointer)?;
    node.multiple_of = optional_f64(object, "multipleOf", pointer)?;
    if let Some(divisor) = node.multiple_of {
        if divisor <= 0.0 {
            return Err(invalid(pointer, "multipleOf must be greater than 0"));
        }
    }
    // 3.0 uses booleans, 3.1 uses the bound itself.
    match object.get("exclusiveMinimum") {
        None => {}
        Some(Value::Bool(flag)) => node.exclusive_minimum = *flag,
        Some(Value::Number(bound)) => {
            node.minimum = bound.as_f64();
            node.exclusive_minimum = true;
        }
        Some(_) => {
            return Err(invalid(
                pointer,
                "exclusiveMinimum must be a boolean or number",
            ))
        }
    }
    match object.get("exclusiveMaximum") {
        None => {}
        Some(Value::Bool(flag)) => node.exclusive_maximum = *flag,
        Some(Value::Number(bound)) => {
            node.maximum = bound.as_f64();
            node.exclusive_maximum = true;
        }
        Some(_) => {
            return Err(invalid(
                pointer,
                "exclusiveMaximum must be a boolean or number",
            ))
        }
    }

    if let Some(keyword) = UNSUPPORTED_KEYWORDS
        .iter()
        .find(|keyword| object.contains_key(**keyword))
    {
        return Err(invalid(
            pointer,
            &format!("unsupported keyword '{}'", keyword),
        ));
    }

    Ok(node)
}

fn parse_type(name: &str, pointer: &str) -> Result<SchemaType, LoadError> {
    SchemaType::parse(name).ok_or_else(|| invalid(pointer, &format!("unknown type '{}'", name)))
}

fn as_bool(value: &Value, pointer: &str, keyword: &str) -> Result<bool, LoadError> {
    value
        .as_bool()
        .ok_or_else(|| invalid(pointer, &format!("{} must be a boolean", keyword)))
}

fn optional_u64(
    object: &Map<String, Value>,
    keyword: &str,
    pointer: &str,
) -> Result<Option<u64>, LoadError> {
    object
        .get(keyword)
        .map(|value| {
            value.as_u64().ok_or_else(|| {
                invalid(
                    pointer,
                    &format!("{} must be a non-negative integer", keyword),
                )
            })
        })
        .transpose()
}

fn optional_f64(
    object: &Map<String, Value>,
    keyword: &str,
    pointer: &str,
) -> Result<Option<f64>, LoadError> {
    object
        .get(keyword)
        .map(|value| {
            value
                .as_f64()
                .ok_or_else(|| invalid(pointer, &format!("{} must be a number", keyword)))
        })
        .transpose()
}

fn invalid(pointer: &str, reason: &str) -> LoadError {
    LoadError::InvalidSchema {
        pointer: pointer.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
