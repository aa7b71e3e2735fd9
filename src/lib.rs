//! # formcheck
//!
//! Streaming validation of `multipart/form-data` request bodies against
//! OpenAPI 3 schemas, reporting every problem with a form in one pass.
//!
//! ## Overview
//!
//! A request body schema is usually an object composed with `allOf`, and a
//! multipart body is a stream of named parts that may repeat. This crate
//! flattens the composition once, decodes the body part by part without
//! buffering file payloads, validates each part against its property schema,
//! and then checks object-level constraints such as required properties over
//! the reconstructed form.
//!
//! Per-field problems accumulate in a stillwater `Validation`; problems that
//! make the request uninterpretable (a malformed body, a cyclic schema, an
//! unsupported media type) abort with a [`StructuralError`].
//!
//! ## Core Types
//!
//! - [`SchemaArena`] / [`SchemaNode`]: schemas addressed by [`SchemaId`]
//! - [`FlatSchema`]: the merged view of an `allOf` composition
//! - [`MultipartReader`]: the streaming body decoder
//! - [`FormAggregator`]: folds parts into a [`FormData`]
//! - [`validate_request_body`]: the per-request entry point
//! - [`Document`]: loads schemas and routes from an OpenAPI document
//!
//! ## Example
//!
//! ```rust
//! use formcheck::{validate_request, Document, ErrorKind, RequestValidationInput};
//!
//! let document = Document::from_json_str(r##"{
//!     "openapi": "3.0.0",
//!     "paths": {"/test": {"post": {"requestBody": {
//!         "required": true,
//!         "content": {"multipart/form-data": {"schema": {
//!             "type": "object",
//!             "required": ["file"],
//!             "allOf": [
//!                 {"$ref": "#/components/schemas/Category"},
//!                 {"properties": {"file": {"type": "string", "format": "binary"}}}
//!             ]
//!         }}}
//!     }}}},
//!     "components": {"schemas": {"Category": {
//!         "type": "object",
//!         "properties": {"name": {"type": "string"}},
//!         "required": ["name"]
//!     }}}
//! }"##).unwrap();
//!
//! let body = b"--b\r\n\
//!     Content-Disposition: form-data; name=\"file\"; filename=\"a.zip\"\r\n\
//!     Content-Type: application/zip\r\n\
//!     \r\n\
//!     PK\x05\x06\r\n\
//!     --b--\r\n";
//! let request = http::Request::post("/test")
//!     .header("content-type", "multipart/form-data; boundary=b")
//!     .body(&body[..])
//!     .unwrap();
//!
//! let route = document.route(&http::Method::POST, "/test").unwrap();
//! let input = RequestValidationInput::new(request, route);
//! let result = validate_request(&document.context(), input).unwrap();
//!
//! let errors = result.into_result().unwrap_err();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors.first().kind, ErrorKind::MissingRequiredProperty);
//! assert_eq!(errors.first().path.to_string(), "name");
//! ```

pub mod context;
pub mod document;
pub mod error;
pub mod form;
pub mod media;
pub mod multipart;
pub mod options;
pub mod path;
pub mod request;
pub mod schema;
pub mod validate;

pub use context::{CancelToken, ValidationContext};
pub use document::Document;
pub use error::{ErrorKind, MultipartError, StructuralError, ValidationError, ValidationErrors};
pub use form::{aggregate, FormAggregator, FormData, PartOutcome, PartValidator, PartValue};
pub use media::{boundary_from_content_type, MediaType};
pub use multipart::{MultipartReader, Part, PartHeaders};
pub use options::{UnknownParts, ValidatorOptions};
pub use path::{FieldPath, PathSegment};
pub use request::{
    validate_request, validate_request_body, Encoding, MediaContent, Operation, RequestBody,
    RequestValidationInput, Route,
};
pub use schema::{
    parse_schema, resolve, AdditionalProperties, ArenaError, FlatSchema, LoadError, MergePolicy,
    SchemaArena, SchemaId, SchemaNode, SchemaType,
};
pub use validate::ValueValidator;

/// Type alias for validation results using ValidationErrors
pub type ValidationResult<T> = stillwater::Validation<T, ValidationErrors>;
