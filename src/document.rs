//! Loading the request-body subset of an OpenAPI 3 document.
//!
//! Only what body validation consumes is read: `components.schemas`,
//! `components.requestBodies`, and for every operation under `paths` its
//! `operationId` and `requestBody` (`required`, `content`, per media type
//! `schema` and `encoding.<property>.contentType`). Everything else in the
//! document is ignored.
//!
//! Errors are accumulated across components and operations; a document with
//! more than one problem fails with [`LoadError::Multiple`].

use std::path::Path;
use std::sync::Arc;

use http::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::context::ValidationContext;
use crate::request::{Encoding, MediaContent, Operation, RequestBody, Route};
use crate::schema::{
    escape_pointer, parse_schema, parse_schema_node, LoadError, SchemaArena, SchemaId,
};

const REQUEST_BODY_PREFIX: &str = "#/components/requestBodies/";

const METHODS: [(&str, Method); 8] = [
    ("get", Method::GET),
    ("put", Method::PUT),
    ("post", Method::POST),
    ("delete", Method::DELETE),
    ("options", Method::OPTIONS),
    ("head", Method::HEAD),
    ("patch", Method::PATCH),
    ("trace", Method::TRACE),
];

/// A loaded document: the schema arena plus one [`Route`] per operation.
///
/// # Example
///
/// ```rust
/// use formcheck::Document;
/// use serde_json::json;
///
/// let document = Document::from_json(&json!({
///     "openapi": "3.0.0",
///     "paths": {
///         "/upload": {
///             "post": {
///                 "requestBody": {
///                     "required": true,
///                     "content": {
///                         "multipart/form-data": {
///                             "schema": {"$ref": "#/components/schemas/Upload"}
///                         }
///                     }
///                 }
///             }
///         }
///     },
///     "components": {
///         "schemas": {
///             "Upload": {
///                 "type": "object",
///                 "properties": {"file": {"type": "string", "format": "binary"}}
///             }
///         }
///     }
/// }))
/// .unwrap();
///
/// let route = document.route(&http::Method::POST, "/upload").unwrap();
/// assert!(route.operation.request_body.as_ref().unwrap().required);
/// assert!(document.schema("Upload").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arc<SchemaArena>,
    routes: Vec<Route>,
}

impl Document {
    pub fn from_json_str(source: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_json(&value)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(source: &str) -> Result<Self, LoadError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(source)?;
        // integer keys such as response codes become strings here
        let value = serde_json::to_value(yaml)?;
        Self::from_json(&value)
    }

    /// Reads a document from disk; `.yaml`/`.yml` files are parsed as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source),
            _ => Self::from_json_str(&source),
        }
    }

    pub fn from_json(document: &Value) -> Result<Self, LoadError> {
        let root = document
            .as_object()
            .ok_or_else(|| LoadError::InvalidDocument {
                pointer: "#".to_string(),
                reason: "document must be an object".to_string(),
            })?;

        let mut loader = Loader {
            arena: SchemaArena::new(),
            request_bodies: IndexMap::new(),
            errors: Vec::new(),
        };

        let components = optional_object(root, "components", "#/components");
        let components = loader.collect(components).flatten();
        if let Some(components) = components {
            loader.load_component_schemas(components);
            loader.load_component_request_bodies(components);
        }

        let routes = match loader.collect(optional_object(root, "paths", "#/paths")) {
            Some(Some(paths)) => loader.load_paths(paths),
            _ => Vec::new(),
        };

        let unresolved = loader.arena.unresolved();
        if !unresolved.is_empty() {
            loader.errors.push(LoadError::UnresolvedRefs(unresolved));
        }

        match loader.errors.len() {
            0 => {
                tracing::debug!(
                    schemas = loader.arena.len(),
                    routes = routes.len(),
                    "loaded OpenAPI document"
                );
                Ok(Self {
                    arena: Arc::new(loader.arena),
                    routes,
                })
            }
            1 => Err(loader.errors.remove(0)),
            _ => Err(LoadError::Multiple(loader.errors)),
        }
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn shared_arena(&self) -> Arc<SchemaArena> {
        Arc::clone(&self.arena)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Looks up an operation by method and exact path template.
    pub fn route(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
    }

    pub fn operation(&self, operation_id: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.operation.operation_id.as_deref() == Some(operation_id))
    }

    /// The id of a `components.schemas` entry.
    pub fn schema(&self, name: &str) -> Option<SchemaId> {
        self.arena.by_name(name)
    }

    /// A validation context sharing this document's arena.
    pub fn context(&self) -> ValidationContext {
        ValidationContext::new(self.shared_arena())
    }
}

struct Loader {
    arena: SchemaArena,
    request_bodies: IndexMap<String, RequestBody>,
    errors: Vec<LoadError>,
}

impl Loader {
    fn collect<T>(&mut self, result: Result<T, LoadError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(error);
                None
            }
        }
    }

    fn load_component_schemas(&mut self, components: &Map<String, Value>) {
        let schemas = match optional_object(components, "schemas", "#/components/schemas") {
            Ok(Some(schemas)) => schemas,
            Ok(None) => return,
            Err(error) => return self.errors.push(error),
        };

        // reserve every name first so references resolve regardless of order
        for name in schemas.keys() {
            self.arena.reserve(name.as_str());
        }
        for (name, schema) in schemas {
            let pointer = format!("#/components/schemas/{}", escape_pointer(name));
            let node = parse_schema_node(&mut self.arena, schema, &pointer);
            if let Some(node) = self.collect(node) {
                let id = self.arena.reserve(name.as_str());
                let stored = self.arena.set(id, node).map_err(LoadError::from);
                self.collect(stored);
            }
        }
    }

    fn load_component_request_bodies(&mut self, components: &Map<String, Value>) {
        let pointer = "#/components/requestBodies";
        let bodies = match optional_object(components, "requestBodies", pointer) {
            Ok(Some(bodies)) => bodies,
            Ok(None) => return,
            Err(error) => return self.errors.push(error),
        };
        for (name, body) in bodies {
            let pointer = format!("{}/{}", pointer, escape_pointer(name));
            let body = self.request_body(body, &pointer);
            if let Some(body) = self.collect(body) {
                self.request_bodies.insert(name.clone(), body);
            }
        }
    }

    fn load_paths(&mut self, paths: &Map<String, Value>) -> Vec<Route> {
        let mut routes = Vec::new();
        for (template, item) in paths {
            let item_pointer = format!("#/paths/{}", escape_pointer(template));
            let Some(item) = item.as_object() else {
                self.errors.push(invalid_document(
                    &item_pointer,
                    "path item must be an object",
                ));
                continue;
            };
            for (method_name, method) in METHODS.iter() {
                let Some(operation) = item.get(*method_name) else {
                    continue;
                };
                let pointer = format!("{}/{}", item_pointer, method_name);
                let operation = self.operation(operation, &pointer);
                if let Some(operation) = self.collect(operation) {
                    routes.push(Route::new(method.clone(), template.clone(), operation));
                }
            }
        }
        routes
    }

    fn operation(&mut self, value: &Value, pointer: &str) -> Result<Operation, LoadError> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid_document(pointer, "operation must be an object"))?;

        let operation_id = match object.get("operationId") {
            None => None,
            Some(Value::String(id)) => Some(id.clone()),
            Some(_) => return Err(invalid_document(pointer, "operationId must be a string")),
        };

        let request_body = match object.get("requestBody") {
            None => None,
            Some(body) => Some(self.request_body(body, &format!("{}/requestBody", pointer))?),
        };

        Ok(Operation {
            operation_id,
            request_body,
        })
    }

    fn request_body(&mut self, value: &Value, pointer: &str) -> Result<RequestBody, LoadError> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid_document(pointer, "requestBody must be an object"))?;

        if let Some(reference) = object.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid_document(pointer, "$ref must be a string"))?;
            let name = reference
                .strip_prefix(REQUEST_BODY_PREFIX)
                .ok_or_else(|| LoadError::UnsupportedRef(reference.to_string()))?;
            return self
                .request_bodies
                .get(name)
                .cloned()
                .ok_or_else(|| LoadError::UnresolvedRefs(vec![reference.to_string()]));
        }

        let required = match object.get("required") {
            None => false,
            Some(Value::Bool(required)) => *required,
            Some(_) => return Err(invalid_document(pointer, "required must be a boolean")),
        };

        let mut body = RequestBody {
            required,
            content: IndexMap::new(),
        };
        let content_pointer = format!("{}/content", pointer);
        let content = optional_object(object, "content", &content_pointer)?
            .ok_or_else(|| invalid_document(pointer, "requestBody must declare content"))?;

        for (media_type, media) in content {
            let media_pointer = format!("{}/{}", content_pointer, escape_pointer(media_type));
            let media = self.media_content(media, &media_pointer)?;
            body.content.insert(media_type.clone(), media);
        }
        Ok(body)
    }

    fn media_content(&mut self, value: &Value, pointer: &str) -> Result<MediaContent, LoadError> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid_document(pointer, "media type must be an object"))?;

        let schema = match object.get("schema") {
            None => None,
            Some(schema) => Some(parse_schema(
                &mut self.arena,
                schema,
                &format!("{}/schema", pointer),
            )?),
        };

        let mut encoding = IndexMap::new();
        let encoding_pointer = format!("{}/encoding", pointer);
        if let Some(entries) = optional_object(object, "encoding", &encoding_pointer)? {
            for (property, entry) in entries {
                let entry_pointer = format!("{}/{}", encoding_pointer, escape_pointer(property));
                let content_type = match entry.get("contentType") {
                    None => None,
                    Some(Value::String(content_type)) => Some(content_type.clone()),
                    Some(_) => {
                        return Err(invalid_document(
                            &entry_pointer,
                            "contentType must be a string",
                        ))
                    }
                };
                encoding.insert(property.clone(), Encoding { content_type });
            }
        }

        Ok(MediaContent { schema, encoding })
    }
}

fn optional_object<'v>(
    parent: &'v Map<String, Value>,
    key: &str,
    pointer: &str,
) -> Result<Option<&'v Map<String, Value>>, LoadError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(invalid_document(pointer, "must be an object")),
    }
}

fn invalid_document(pointer: &str, reason: &str) -> LoadError {
    LoadError::InvalidDocument {
        pointer: pointer.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_refs_are_shared() {
        let document = Document::from_json(&json!({
            "paths": {
                "/a": {"post": {
                    "operationId": "a",
                    "requestBody": {"$ref": "#/components/requestBodies/Form"}
                }},
                "/b": {"put": {"requestBody": {"$ref": "#/components/requestBodies/Form"}}}
            },
            "components": {
                "requestBodies": {
                    "Form": {"content": {"multipart/form-data": {"schema": {"type": "object"}}}}
                }
            }
        }))
        .unwrap();

        let a = document.operation("a").unwrap();
        let b = document.route(&Method::PUT, "/b").unwrap();
        assert_eq!(a.operation.request_body, b.operation.request_body);
        assert!(!a.operation.request_body.as_ref().unwrap().required);
    }

    #[test]
    fn errors_accumulate() {
        let err = Document::from_json(&json!({
            "paths": {
                "/a": {"post": {"requestBody": {"content": {
                    "multipart/form-data": {"schema": {"type": 5}}
                }}}},
                "/b": {"post": {"requestBody": {"content": {
                    "multipart/form-data": {"schema": {"$ref": "#/components/schemas/Nope"}}
                }}}}
            }
        }))
        .unwrap_err();

        match err {
            LoadError::Multiple(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(matches!(errors[0], LoadError::InvalidSchema { .. }));
                assert!(matches!(
                    &errors[1],
                    LoadError::UnresolvedRefs(names) if names == &vec!["Nope".to_string()]
                ));
            }
            other => panic!("expected Multiple, got {:?}", other),
        }
    }

    #[test]
    fn components_may_reference_forward() {
        let document = Document::from_json(&json!({
            "components": {
                "schemas": {
                    "A": {"allOf": [{"$ref": "#/components/schemas/B"}]},
                    "B": {"type": "object", "properties": {"x": {"type": "string"}}}
                }
            }
        }))
        .unwrap();
        let a = document.schema("A").unwrap();
        let flat = document.arena().resolve(a, Default::default()).unwrap();
        assert!(flat.properties.contains_key("x"));
    }

    #[test]
    fn encoding_is_loaded() {
        let document = Document::from_json(&json!({
            "paths": {"/u": {"post": {"requestBody": {"content": {"multipart/form-data": {
                "schema": {"type": "object"},
                "encoding": {"file": {"contentType": "image/png, image/jpeg"}}
            }}}}}}
        }))
        .unwrap();
        let body = document.routes()[0]
            .operation
            .request_body
            .as_ref()
            .unwrap();
        let media = &body.content["multipart/form-data"];
        assert_eq!(
            media.encoding["file"].content_type.as_deref(),
            Some("image/png, image/jpeg")
        );
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(matches!(
            Document::from_json(&json!([])),
            Err(LoadError::InvalidDocument { .. })
        ));
    }
}
