//! Schema model.
//!
//! A loaded document's schemas live in a [`SchemaArena`] and refer to each
//! other through copyable [`SchemaId`] handles, so recursive and shared
//! schemas never form ownership cycles. [`resolve`] flattens `allOf`
//! composition into a [`FlatSchema`].
//!
//! # Example
//!
//! ```rust
//! use formcheck::{SchemaArena, SchemaNode, MergePolicy};
//!
//! let mut arena = SchemaArena::new();
//! let name = arena.insert(SchemaNode::string());
//! let category = arena
//!     .define("Category", SchemaNode::object().property("name", name).required("name"))
//!     .unwrap();
//! let file = arena.insert(SchemaNode::binary());
//! let upload = arena.insert(
//!     SchemaNode::object()
//!         .all_of(category)
//!         .property("file", file)
//!         .required("file"),
//! );
//!
//! let flat = arena.resolve(upload, MergePolicy::LastWins).unwrap();
//! assert!(flat.properties.contains_key("name"));
//! assert!(flat.required.contains("file"));
//! ```

mod arena;
mod loader;
mod resolve;

pub use arena::{ArenaError, SchemaArena, SchemaId};
pub(crate) use loader::{escape_pointer, parse_schema_node};
pub use loader::{parse_schema, LoadError};
pub use resolve::{resolve, FlatSchema, MergePolicy};

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use serde_json::Value;

/// The primitive `type` of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SchemaType::String),
            "number" => Some(SchemaType::Number),
            "integer" => Some(SchemaType::Integer),
            "boolean" => Some(SchemaType::Boolean),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
        }
    }
}

/// How properties missing from `properties` are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdditionalProperties {
    /// Not stated; OpenAPI treats this as allowed.
    #[default]
    Unspecified,
    Allow,
    Deny,
    /// Extra properties must match this schema.
    Schema(SchemaId),
}

impl AdditionalProperties {
    pub fn is_specified(self) -> bool {
        !matches!(self, AdditionalProperties::Unspecified)
    }
}

/// A compiled `pattern` keyword.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    source: String,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(source)?,
            source: source.to_string(),
        })
    }

    /// Patterns are unanchored, as in JSON Schema.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// One schema object of an OpenAPI document.
///
/// Nodes are built with a builder API and then stored in a [`SchemaArena`];
/// child schemas are referenced by [`SchemaId`].
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub(crate) schema_type: Option<SchemaType>,
    pub(crate) format: Option<String>,
    pub(crate) nullable: bool,
    pub(crate) properties: IndexMap<String, SchemaId>,
    pub(crate) required: IndexSet<String>,
    pub(crate) all_of: Vec<SchemaId>,
    pub(crate) items: Option<SchemaId>,
    pub(crate) additional_properties: AdditionalProperties,
    pub(crate) enum_values: Vec<Value>,
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) minimum: Option<f64>,
    pub(crate) maximum: Option<f64>,
    pub(crate) exclusive_minimum: bool,
    pub(crate) exclusive_maximum: bool,
    pub(crate) multiple_of: Option<f64>,
    pub(crate) min_items: Option<u64>,
    pub(crate) max_items: Option<u64>,
    pub(crate) unique_items: bool,
}

impl SchemaNode {
    /// An untyped node that accepts any value.
    pub fn new() -> Self {
        Self::default()
    }

    fn typed(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    pub fn object() -> Self {
        Self::typed(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::typed(SchemaType::String)
    }

    /// `type: string, format: binary`, an opaque file payload.
    pub fn binary() -> Self {
        Self::string().format("binary")
    }

    pub fn integer() -> Self {
        Self::typed(SchemaType::Integer)
    }

    pub fn number() -> Self {
        Self::typed(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::typed(SchemaType::Boolean)
    }

    pub fn array(items: SchemaId) -> Self {
        Self::typed(SchemaType::Array).items(items)
    }

    pub fn with_type(mut self, schema_type: SchemaType) -> Self {
        self.schema_type = Some(schema_type);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Declares (or replaces) a property.
    pub fn property(mut self, name: impl Into<String>, schema: SchemaId) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.insert(name.into());
        self
    }

    /// Appends an `allOf` branch.
    pub fn all_of(mut self, branch: SchemaId) -> Self {
        self.all_of.push(branch);
        self
    }

    pub fn items(mut self, items: SchemaId) -> Self {
        self.items = Some(items);
        self
    }

    pub fn additional_properties(mut self, setting: AdditionalProperties) -> Self {
        self.additional_properties = setting;
        self
    }

    pub fn enum_values(mut self, values: Vec<Value>) -> Self {
        self.enum_values = values;
        self
    }

    /// Minimum length in characters, or in bytes for binary payloads.
    pub fn min_length(mut self, min: u64) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: u64) -> Self {
        self.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn maximum(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    pub fn exclusive_minimum(mut self, exclusive: bool) -> Self {
        self.exclusive_minimum = exclusive;
        self
    }

    pub fn exclusive_maximum(mut self, exclusive: bool) -> Self {
        self.exclusive_maximum = exclusive;
        self
    }

    pub fn multiple_of(mut self, divisor: f64) -> Self {
        self.multiple_of = Some(divisor);
        self
    }

    pub fn min_items(mut self, min: u64) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: u64) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn unique_items(mut self) -> Self {
        self.unique_items = true;
        self
    }

    pub fn schema_type(&self) -> Option<SchemaType> {
        self.schema_type
    }

    pub fn format_name(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn properties(&self) -> &IndexMap<String, SchemaId> {
        &self.properties
    }

    pub fn required_names(&self) -> &IndexSet<String> {
        &self.required
    }

    pub fn branches(&self) -> &[SchemaId] {
        &self.all_of
    }

    /// True if the node neither declares nor composes any properties.
    pub fn is_leaf(&self) -> bool {
        self.properties.is_empty() && self.all_of.is_empty()
    }
}
