//! Terminal errors that abort a validation pass.

use super::ErrorKind;

/// Failure while decoding a multipart body.
#[derive(Debug, thiserror::Error)]
pub enum MultipartError {
    #[error("invalid multipart boundary: {0}")]
    InvalidBoundary(String),

    #[error("no boundary match for '--{boundary}' in multipart body")]
    MissingBoundary { boundary: String },

    #[error("multipart body ended inside part {index}")]
    Truncated { index: usize },

    #[error("unexpected bytes after boundary delimiter before part {index}")]
    BadDelimiter { index: usize },

    #[error("header block of part {index} exceeds {limit} bytes")]
    HeadersTooLarge { index: usize, limit: usize },

    #[error("malformed header line in part {index}: {line:?}")]
    MalformedHeader { index: usize, line: String },

    #[error("part {index} has no Content-Disposition header")]
    MissingDisposition { index: usize },

    #[error("part {index} has disposition '{disposition}', expected form-data")]
    NotFormData { index: usize, disposition: String },

    #[error("Content-Disposition of part {index} has no name")]
    MissingName { index: usize },

    #[error("failed to read multipart body: {0}")]
    Io(#[from] std::io::Error),

    #[error("multipart decoding cancelled")]
    Cancelled,
}

/// A failure that makes further validation of the request meaningless.
///
/// Exactly one structural error is returned from a validation call; no
/// per-field errors accompany it.
#[derive(Debug, thiserror::Error)]
pub enum StructuralError {
    #[error("allOf composition cycles back through schema {schema}")]
    SchemaCycle { schema: String },

    #[error("unsupported allOf composition in schema {schema}: {reason}")]
    UnsupportedComposition { schema: String, reason: String },

    #[error(
        "property '{property}' is defined differently by several allOf branches of schema {schema}"
    )]
    PropertyConflict { schema: String, property: String },

    #[error("malformed multipart body: {0}")]
    MalformedMultipart(MultipartError),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("validation cancelled")]
    Cancelled,
}

impl StructuralError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StructuralError::SchemaCycle { .. } => ErrorKind::SchemaCycle,
            StructuralError::UnsupportedComposition { .. } => ErrorKind::UnsupportedComposition,
            StructuralError::PropertyConflict { .. } => ErrorKind::PropertyConflict,
            StructuralError::MalformedMultipart(_) => ErrorKind::MalformedMultipart,
            StructuralError::UnsupportedMediaType(_) => ErrorKind::UnsupportedMediaType,
            StructuralError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<MultipartError> for StructuralError {
    fn from(error: MultipartError) -> Self {
        match error {
            MultipartError::Cancelled => StructuralError::Cancelled,
            other => StructuralError::MalformedMultipart(other),
        }
    }
}
