//! Validation of a single part against its property schema.

use std::io::Read;

use serde_json::Value;

use crate::error::{ErrorKind, StructuralError, ValidationError};
use crate::multipart::Part;
use crate::path::FieldPath;
use crate::schema::{FlatSchema, SchemaType};
use crate::validate::ValueValidator;

use super::PartValue;

/// What a part validation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PartOutcome {
    pub value: PartValue,
    pub errors: Vec<ValidationError>,
    /// Payload bytes held by `value`; zero for binary parts.
    pub buffered_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decoding {
    /// Counted, never buffered.
    Binary,
    Text,
    Json,
}

/// Decodes one part according to its schema and validates the result.
///
/// | schema | decoding |
/// |---|---|
/// | `string` + `format: binary` | streamed, only the size is kept |
/// | `string` | UTF-8 text |
/// | `object`, `array`, `number`, `integer`, `boolean` | JSON |
/// | untyped | binary if the part has a filename, JSON for a JSON content type, text otherwise |
#[derive(Debug, Clone, Copy)]
pub struct PartValidator<'a> {
    values: ValueValidator<'a>,
    max_buffered_bytes: usize,
    form_budget: Option<FormBudget>,
}

/// What is left of the form-wide buffering limit.
#[derive(Debug, Clone, Copy)]
struct FormBudget {
    remaining: usize,
    limit: usize,
}

impl<'a> PartValidator<'a> {
    pub fn new(values: ValueValidator<'a>, max_buffered_bytes: usize) -> Self {
        Self {
            values,
            max_buffered_bytes,
            form_budget: None,
        }
    }

    /// Caps buffering at `remaining` bytes of a form-wide `limit`.
    pub fn with_form_budget(mut self, remaining: usize, limit: usize) -> Self {
        self.form_budget = Some(FormBudget { remaining, limit });
        self
    }

    /// Validates `part` against `schema`, reporting errors at `path`.
    ///
    /// `allowed_content_types` is the comma separated `encoding.contentType`
    /// of the property, if the request body declares one. The part payload
    /// is always fully consumed.
    pub fn validate_part<R: Read>(
        &self,
        part: &mut Part<'_, R>,
        schema: &FlatSchema,
        path: &FieldPath,
        allowed_content_types: Option<&str>,
    ) -> Result<PartOutcome, StructuralError> {
        let decoding = decoding_for(schema, part);
        let mut errors = Vec::new();

        if let Some(error) = check_content_type(part, schema, path, allowed_content_types) {
            errors.push(error);
        }

        let (value, buffered_bytes) = match decoding {
            Decoding::Binary => {
                let size = part.skip()?;
                self.values
                    .check_binary_size(schema, size, path, &mut errors);
                let value = PartValue::Binary {
                    filename: part.filename().map(str::to_string),
                    content_type: part.content_type().to_string(),
                    size,
                };
                (value, 0)
            }
            Decoding::Text | Decoding::Json => {
                match self.decode_buffered(part, decoding, path, &mut errors)? {
                    Some((value, size)) => {
                        self.values.check_flat(schema, &value, path, &mut errors)?;
                        (PartValue::Value(value), size)
                    }
                    None => (PartValue::Value(Value::Null), 0),
                }
            }
        };

        let index = part.index();
        let errors = errors
            .into_iter()
            .map(|error| error.with_part_index(index))
            .collect();
        Ok(PartOutcome {
            value,
            errors,
            buffered_bytes,
        })
    }

    /// The decoded value and its payload size, or `None` when the payload
    /// could not be decoded; the reason is pushed onto `errors`.
    fn decode_buffered<R: Read>(
        &self,
        part: &mut Part<'_, R>,
        decoding: Decoding,
        path: &FieldPath,
        errors: &mut Vec<ValidationError>,
    ) -> Result<Option<(Value, usize)>, StructuralError> {
        let budget = self
            .form_budget
            .filter(|budget| budget.remaining < self.max_buffered_bytes);
        let limit = budget.map_or(self.max_buffered_bytes, |budget| budget.remaining);

        let mut payload = Vec::new();
        if !part.read_limited(limit, &mut payload)? {
            part.skip()?;
            errors.push(oversized(path, self.max_buffered_bytes, budget));
            return Ok(None);
        }
        let size = payload.len();

        let value = match decoding {
            Decoding::Json => match serde_json::from_slice::<Value>(&payload) {
                Ok(value) => value,
                Err(e) => {
                    errors.push(
                        ValidationError::new(
                            path.clone(),
                            ErrorKind::TypeMismatch,
                            format!("part is not valid JSON: {}", e),
                        )
                        .with_code("invalid_json")
                        .with_expected("JSON document")
                        .with_got(part.content_type().to_string()),
                    );
                    return Ok(None);
                }
            },
            _ => match String::from_utf8(payload) {
                Ok(text) => Value::String(text),
                Err(e) => {
                    errors.push(
                        ValidationError::new(
                            path.clone(),
                            ErrorKind::TypeMismatch,
                            format!(
                                "part is not valid UTF-8 text (invalid byte at offset {})",
                                e.utf8_error().valid_up_to()
                            ),
                        )
                        .with_code("invalid_utf8")
                        .with_expected("UTF-8 text"),
                    );
                    return Ok(None);
                }
            },
        };
        Ok(Some((value, size)))
    }
}

fn oversized(path: &FieldPath, part_limit: usize, budget: Option<FormBudget>) -> ValidationError {
    match budget {
        Some(budget) => ValidationError::new(
            path.clone(),
            ErrorKind::FormatViolation,
            format!("form data exceeds {} buffered bytes", budget.limit),
        )
        .with_code("form_too_large")
        .with_expected(format!("at most {} bytes in total", budget.limit)),
        None => ValidationError::new(
            path.clone(),
            ErrorKind::FormatViolation,
            format!("part is larger than {} bytes", part_limit),
        )
        .with_code("part_too_large")
        .with_expected(format!("at most {} bytes", part_limit)),
    }
}

fn decoding_for<R: Read>(schema: &FlatSchema, part: &Part<'_, R>) -> Decoding {
    if schema.is_binary() {
        return Decoding::Binary;
    }
    match schema.effective_type() {
        Some(SchemaType::String) => Decoding::Text,
        Some(_) => Decoding::Json,
        None if part.filename().is_some() => Decoding::Binary,
        None if part.media_type().is_some_and(|media| media.is_json()) => Decoding::Json,
        None => Decoding::Text,
    }
}

fn check_content_type<R: Read>(
    part: &Part<'_, R>,
    schema: &FlatSchema,
    path: &FieldPath,
    allowed: Option<&str>,
) -> Option<ValidationError> {
    let media = part.media_type();
    let mismatch = |expected: &str| {
        ValidationError::new(
            path.clone(),
            ErrorKind::TypeMismatch,
            format!("content type '{}' is not allowed", part.content_type()),
        )
        .with_code("content_type")
        .with_expected(expected.to_string())
        .with_got(part.content_type().to_string())
    };

    match allowed {
        Some(allowed) => {
            let accepted = media
                .as_ref()
                .is_some_and(|media| media.matches_any(allowed));
            (!accepted).then(|| mismatch(allowed))
        }
        None if schema.is_binary() => {
            let plain = media
                .as_ref()
                .map_or(true, |media| media.essence() == "text/plain");
            plain.then(|| mismatch("a binary content type"))
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::MultipartReader;
    use crate::schema::{MergePolicy, SchemaArena, SchemaNode};

    fn body(headers: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = format!("--x\r\n{}\r\n\r\n", headers).into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--x--");
        body
    }

    fn run(node: SchemaNode, headers: &str, payload: &[u8], allowed: Option<&str>) -> PartOutcome {
        let mut arena = SchemaArena::new();
        let id = arena.insert(node);
        let flat = arena.resolve(id, MergePolicy::LastWins).unwrap();
        let values = ValueValidator::new(&arena, MergePolicy::LastWins);
        let validator = PartValidator::new(values, 64);

        let data = body(headers, payload);
        let mut reader = MultipartReader::new(&data[..], "x").unwrap();
        let mut part = reader.next_part().unwrap().unwrap();
        let path = FieldPath::from(part.name());
        validator
            .validate_part(&mut part, &flat, &path, allowed)
            .unwrap()
    }

    const FILE: &str = concat!(
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.zip\"\r\n",
        "Content-Type: application/zip",
    );

    #[test]
    fn binary_is_counted() {
        let outcome = run(SchemaNode::binary(), FILE, &[0x50, 0x4b, 0x05, 0x06], None);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.buffered_bytes, 0);
        assert_eq!(
            outcome.value,
            PartValue::Binary {
                filename: Some("a.zip".into()),
                content_type: "application/zip".into(),
                size: 4,
            }
        );
    }

    #[test]
    fn binary_byte_length() {
        let outcome = run(SchemaNode::binary().max_length(2), FILE, b"abc", None);
        assert_eq!(outcome.errors[0].code, "max_length");
        assert_eq!(outcome.errors[0].part_index, Some(0));
    }

    #[test]
    fn plain_text_for_binary_is_a_mismatch() {
        let outcome = run(
            SchemaNode::binary(),
            "Content-Disposition: form-data; name=\"file\"",
            b"hello",
            None,
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].kind, ErrorKind::TypeMismatch);
        assert_eq!(outcome.errors[0].code, "content_type");
    }

    #[test]
    fn declared_encoding_list() {
        let ok = run(
            SchemaNode::binary(),
            FILE,
            b"z",
            Some("image/png, application/*"),
        );
        assert!(ok.errors.is_empty());

        let rejected = run(SchemaNode::binary(), FILE, b"z", Some("image/*"));
        assert_eq!(rejected.errors[0].code, "content_type");
        assert_eq!(rejected.errors[0].expected.as_deref(), Some("image/*"));
    }

    #[test]
    fn text_keywords() {
        let node = SchemaNode::string().min_length(5);
        let outcome = run(
            node,
            "Content-Disposition: form-data; name=\"d\"",
            b"hey",
            None,
        );
        assert_eq!(outcome.value, PartValue::Value(Value::String("hey".into())));
        assert_eq!(outcome.buffered_bytes, 3);
        assert_eq!(outcome.errors[0].code, "min_length");
    }

    #[test]
    fn empty_text_is_valid() {
        let headers = "Content-Disposition: form-data; name=\"d\"";
        let outcome = run(SchemaNode::string(), headers, b"", None);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn invalid_utf8() {
        let outcome = run(
            SchemaNode::string(),
            "Content-Disposition: form-data; name=\"d\"",
            &[0x66, 0xff, 0x66],
            None,
        );
        assert_eq!(outcome.errors[0].code, "invalid_utf8");
        assert_eq!(outcome.value, PartValue::Value(Value::Null));
    }

    #[test]
    fn json_payloads() {
        let outcome = run(
            SchemaNode::integer().maximum(10.0),
            "Content-Disposition: form-data; name=\"n\"",
            b"42",
            None,
        );
        assert_eq!(outcome.errors[0].code, "max_value");

        let broken = run(
            SchemaNode::object(),
            "Content-Disposition: form-data; name=\"o\"\r\nContent-Type: application/json",
            b"{\"name\":",
            None,
        );
        assert_eq!(broken.errors[0].code, "invalid_json");
        assert_eq!(broken.errors[0].kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn oversized_text_part() {
        let outcome = run(
            SchemaNode::string(),
            "Content-Disposition: form-data; name=\"d\"",
            &[b'a'; 100],
            None,
        );
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].code, "part_too_large");
    }

    #[test]
    fn untyped_decoding() {
        let json = run(
            SchemaNode::new(),
            "Content-Disposition: form-data; name=\"c\"\r\nContent-Type: application/json",
            b"{\"name\": \"foo\"}",
            None,
        );
        assert_eq!(
            json.value,
            PartValue::Value(serde_json::json!({"name": "foo"}))
        );

        let file = run(SchemaNode::new(), FILE, b"PK", None);
        assert!(file.value.is_binary());

        let headers = "Content-Disposition: form-data; name=\"t\"";
        let text = run(SchemaNode::new(), headers, b"note", None);
        assert_eq!(text.value, PartValue::Value(Value::String("note".into())));
    }
}
