//! Error types.
//!
//! Failures fall in two classes. Per-field problems ([`ValidationError`]) are
//! accumulated so the caller sees every reason at once. Structural problems
//! ([`StructuralError`]) mean the input cannot be interpreted any further and
//! abort the whole validation.

mod field_error;
mod structural;

pub use field_error::{ValidationError, ValidationErrors};
pub use structural::{MultipartError, StructuralError};

use std::fmt::{self, Display};

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `allOf` composition refers back to itself.
    SchemaCycle,
    /// An `allOf` branch cannot be merged into an object view.
    UnsupportedComposition,
    /// Two branches define the same property differently under strict merging.
    PropertyConflict,
    /// The multipart body cannot be parsed.
    MalformedMultipart,
    /// The request is not `multipart/form-data` or the operation does not accept it.
    UnsupportedMediaType,
    /// Validation was cancelled by the caller.
    Cancelled,
    /// A part name matches no schema property.
    UnexpectedProperty,
    /// A required property had no part at all.
    MissingRequiredProperty,
    /// A value or part has the wrong type, encoding, or content type.
    TypeMismatch,
    /// A value violates a length, pattern, enum, or numeric constraint.
    FormatViolation,
}

impl ErrorKind {
    /// Structural kinds abort validation instead of being collected.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            ErrorKind::SchemaCycle
                | ErrorKind::UnsupportedComposition
                | ErrorKind::PropertyConflict
                | ErrorKind::MalformedMultipart
                | ErrorKind::UnsupportedMediaType
                | ErrorKind::Cancelled
        )
    }

    pub(crate) fn default_code(self) -> &'static str {
        match self {
            ErrorKind::SchemaCycle => "schema_cycle",
            ErrorKind::UnsupportedComposition => "unsupported_composition",
            ErrorKind::PropertyConflict => "property_conflict",
            ErrorKind::MalformedMultipart => "malformed_multipart",
            ErrorKind::UnsupportedMediaType => "unsupported_media_type",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::UnexpectedProperty => "additional_property",
            ErrorKind::MissingRequiredProperty => "required",
            ErrorKind::TypeMismatch => "invalid_type",
            ErrorKind::FormatViolation => "format",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SchemaCycle => "SchemaCycle",
            ErrorKind::UnsupportedComposition => "UnsupportedComposition",
            ErrorKind::PropertyConflict => "PropertyConflict",
            ErrorKind::MalformedMultipart => "MalformedMultipart",
            ErrorKind::UnsupportedMediaType => "UnsupportedMediaType",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::UnexpectedProperty => "UnexpectedProperty",
            ErrorKind::MissingRequiredProperty => "MissingRequiredProperty",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::FormatViolation => "FormatViolation",
        };
        f.write_str(name)
    }
}
