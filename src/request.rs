//! Request-level entry points.
//!
//! A router (out of scope here) matches an incoming request to a [`Route`].
//! [`validate_request_body`] then checks the request's `multipart/form-data`
//! body against the route's [`RequestBody`]:
//!
//! 1. the request media type is matched against the declared content,
//! 2. the body schema is resolved (through the arena's cache),
//! 3. the body is streamed part by part through the aggregator.
//!
//! Structural problems abort with a [`StructuralError`]; everything else is
//! collected into the returned [`ValidationResult`].

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{Method, Request};
use indexmap::IndexMap;
use stillwater::Validation;

use crate::context::ValidationContext;
use crate::error::StructuralError;
use crate::form::{aggregate, FormAggregator, FormData};
use crate::media::{boundary_from_content_type, MediaType, MULTIPART_FORM_DATA};
use crate::multipart::MultipartReader;
use crate::schema::{FlatSchema, SchemaId};
use crate::ValidationResult;

/// Per-property serialization details of a media type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    /// Comma separated content types accepted for the part, wildcards allowed.
    pub content_type: Option<String>,
}

/// The schema and encodings declared for one media type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaContent {
    pub schema: Option<SchemaId>,
    pub encoding: IndexMap<String, Encoding>,
}

impl MediaContent {
    pub fn new(schema: SchemaId) -> Self {
        Self {
            schema: Some(schema),
            encoding: IndexMap::new(),
        }
    }

    pub fn with_encoding(
        mut self,
        property: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.encoding.insert(
            property.into(),
            Encoding {
                content_type: Some(content_type.into()),
            },
        );
        self
    }
}

/// An operation's `requestBody`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    pub required: bool,
    /// Keyed by media type or media range as written in the document.
    pub content: IndexMap<String, MediaContent>,
}

impl RequestBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_content(mut self, media_type: impl Into<String>, content: MediaContent) -> Self {
        self.content.insert(media_type.into(), content);
        self
    }

    /// The most specific entry matching `media`: exact, then `type/*`, then `*/*`.
    pub fn content_for(&self, media: &MediaType) -> Option<&MediaContent> {
        self.content
            .iter()
            .filter_map(|(key, content)| {
                let declared = MediaType::parse(key)?;
                let rank = match (declared.main_type(), declared.sub_type()) {
                    ("*", "*") => 0,
                    (main, "*") if main == media.main_type() => 1,
                    (main, sub) if main == media.main_type() && sub == media.sub_type() => 2,
                    _ => return None,
                };
                Some((rank, content))
            })
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, content)| content)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub request_body: Option<RequestBody>,
}

/// A matched operation: method, path template and operation details.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub operation: Operation,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, operation: Operation) -> Self {
        Self {
            method,
            path: path.into(),
            operation,
        }
    }

    /// The operation id, or `METHOD path` when the operation has none.
    pub fn label(&self) -> String {
        match &self.operation.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// A request together with the route it was matched to.
#[derive(Debug)]
pub struct RequestValidationInput<'a, B> {
    pub request: Request<B>,
    /// Path template parameters extracted by the router. Not used by body
    /// validation.
    pub path_params: HashMap<String, String>,
    pub route: &'a Route,
}

impl<'a, B> RequestValidationInput<'a, B> {
    pub fn new(request: Request<B>, route: &'a Route) -> Self {
        Self {
            request,
            path_params: HashMap::new(),
            route,
        }
    }

    pub fn with_path_params(mut self, path_params: HashMap<String, String>) -> Self {
        self.path_params = path_params;
        self
    }
}

/// Validates the route's request body, if it declares one.
pub fn validate_request<B: Read>(
    ctx: &ValidationContext,
    input: RequestValidationInput<'_, B>,
) -> Result<ValidationResult<FormData>, StructuralError> {
    let route = input.route;
    match &route.operation.request_body {
        Some(request_body) => validate_request_body(ctx, input, request_body),
        None => {
            tracing::debug!(route = %route.label(), "route declares no request body");
            Ok(Validation::Success(FormData::new()))
        }
    }
}

/// Validates a `multipart/form-data` request body.
///
/// A body that is not `required` may be omitted entirely (no `Content-Type`);
/// the result is then an empty form.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use formcheck::{
///     validate_request_body, MediaContent, Operation, RequestBody, RequestValidationInput,
///     Route, SchemaArena, SchemaNode, ValidationContext,
/// };
///
/// let mut arena = SchemaArena::new();
/// let note = arena.insert(SchemaNode::string());
/// let form = arena.insert(SchemaNode::object().property("note", note).required("note"));
/// let body = RequestBody::new()
///     .required()
///     .with_content("multipart/form-data", MediaContent::new(form));
/// let route = Route::new(http::Method::POST, "/notes", Operation::default());
///
/// let payload = b"--b\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--b--\r\n";
/// let request = http::Request::post("/notes")
///     .header("content-type", "multipart/form-data; boundary=b")
///     .body(&payload[..])
///     .unwrap();
///
/// let ctx = ValidationContext::new(Arc::new(arena));
/// let input = RequestValidationInput::new(request, &route);
/// let result = validate_request_body(&ctx, input, &body).unwrap();
/// assert!(result.is_success());
/// ```
pub fn validate_request_body<B: Read>(
    ctx: &ValidationContext,
    input: RequestValidationInput<'_, B>,
    request_body: &RequestBody,
) -> Result<ValidationResult<FormData>, StructuralError> {
    let route = input.route.label();
    if ctx.is_cancelled() {
        return Err(StructuralError::Cancelled);
    }

    let (head, body) = input.request.into_parts();
    let Some(header) = head.headers.get(CONTENT_TYPE) else {
        if request_body.required {
            tracing::warn!(route = %route, "required request body sent without Content-Type");
            return Err(StructuralError::UnsupportedMediaType(
                "request has no Content-Type".to_string(),
            ));
        }
        return Ok(Validation::Success(FormData::new()));
    };

    let content_type = header.to_str().map_err(|_| {
        StructuralError::UnsupportedMediaType("Content-Type is not valid ASCII".to_string())
    })?;
    let media = MediaType::parse(content_type)
        .ok_or_else(|| StructuralError::UnsupportedMediaType(content_type.to_string()))?;
    if !media.is_multipart_form_data() {
        tracing::warn!(
            route = %route,
            media_type = %media.essence(),
            "unsupported request media type"
        );
        return Err(StructuralError::UnsupportedMediaType(media.essence()));
    }
    let content = request_body.content_for(&media).ok_or_else(|| {
        StructuralError::UnsupportedMediaType(format!(
            "operation does not accept {}",
            MULTIPART_FORM_DATA
        ))
    })?;

    let flat = match content.schema {
        Some(schema) => ctx.arena().resolve(schema, ctx.options().merge_policy())?,
        None => Arc::new(FlatSchema::default()),
    };

    let boundary = boundary_from_content_type(content_type)?;
    let mut reader = MultipartReader::new(body, &boundary)?
        .with_max_header_bytes(ctx.options().max_header_bytes())
        .with_cancel_token(ctx.cancel_token().clone());
    let aggregator =
        FormAggregator::new(ctx.arena(), flat, ctx.options()).with_encoding(&content.encoding);

    match aggregate(&mut reader, aggregator) {
        Ok(result) => {
            tracing::debug!(
                route = %route,
                parts = reader.parts_read(),
                errors = match &result {
                    Validation::Success(_) => 0,
                    Validation::Failure(errors) => errors.len(),
                },
                "validated multipart request body"
            );
            Ok(result)
        }
        Err(error) => {
            tracing::warn!(
                route = %route,
                kind = %error.kind(),
                error = %error,
                "request body validation aborted"
            );
            Err(error)
        }
    }
}
