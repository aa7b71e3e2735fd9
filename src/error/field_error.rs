//! Per-field validation errors.
//!
//! [`ValidationError`] describes one reason a form is invalid and
//! [`ValidationErrors`] accumulates them so a caller gets every reason in a
//! single pass.

use std::fmt::{self, Display};

use stillwater::prelude::*;

use crate::path::FieldPath;

use super::ErrorKind;

/// A single reason a form failed validation.
///
/// `kind` is the coarse category from [`ErrorKind`]; `code` is a finer,
/// machine-readable tag such as `min_length` or `content_type`.
///
/// # Example
///
/// ```rust
/// use formcheck::{ErrorKind, FieldPath, ValidationError};
///
/// let error = ValidationError::new(
///     FieldPath::from("file"),
///     ErrorKind::TypeMismatch,
///     "part content type is not allowed",
/// )
/// .with_code("content_type")
/// .with_got("text/plain")
/// .with_part_index(0);
///
/// assert_eq!(error.code, "content_type");
/// assert_eq!(error.part_index, Some(0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Where in the form the failure was found.
    pub path: FieldPath,
    pub kind: ErrorKind,
    pub message: String,
    /// The offending value, rendered for display.
    pub got: Option<String>,
    pub expected: Option<String>,
    /// Machine-readable error code.
    pub code: String,
    /// Zero-based position of the multipart part the error came from.
    pub part_index: Option<usize>,
}

impl ValidationError {
    /// Creates an error whose code defaults to the kind's default code.
    pub fn new(path: FieldPath, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
            got: None,
            expected: None,
            code: kind.default_code().to_string(),
            part_index: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_got(mut self, got: impl Into<String>) -> Self {
        self.got = Some(got.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_part_index(mut self, index: usize) -> Self {
        self.part_index = Some(index);
        self
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "(form): {}", self.message)?;
        } else {
            write!(f, "{}: {}", self.path, self.message)?;
        }
        if let Some(ref expected) = self.expected {
            write!(f, " (expected: {})", expected)?;
        }
        if let Some(ref got) = self.got {
            write!(f, " (got: {})", got)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A non-empty, ordered collection of [`ValidationError`]s.
///
/// Order follows the multipart stream: errors for earlier parts come first,
/// and missing-required errors are appended last in required-set order.
///
/// ```rust
/// use formcheck::{ErrorKind, FieldPath, ValidationError, ValidationErrors};
/// use stillwater::prelude::*;
///
/// let a = ValidationErrors::single(ValidationError::new(
///     FieldPath::from("name"),
///     ErrorKind::MissingRequiredProperty,
///     "required property 'name' is missing",
/// ));
/// let b = ValidationErrors::single(ValidationError::new(
///     FieldPath::from("age"),
///     ErrorKind::TypeMismatch,
///     "expected integer",
/// ));
///
/// assert_eq!(a.combine(b).len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(NonEmptyVec<ValidationError>);

impl ValidationErrors {
    pub fn single(error: ValidationError) -> Self {
        Self(NonEmptyVec::singleton(error))
    }

    /// Builds a collection from a vec, or `None` when the vec is empty.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        let mut errors = errors.into_iter();
        let head = errors.next()?;
        let collected = errors.fold(NonEmptyVec::singleton(head), |acc, error| {
            acc.combine(NonEmptyVec::singleton(error))
        });
        Some(Self(collected))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn first(&self) -> &ValidationError {
        self.0.head()
    }

    pub fn of_kind(&self, kind: ErrorKind) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn with_code(&self, code: &str) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.code == code).collect()
    }

    pub fn at_path(&self, path: &FieldPath) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| &e.path == path).collect()
    }

    /// Errors whose path starts at the named form property.
    pub fn for_property(&self, name: &str) -> Vec<&ValidationError> {
        self.0
            .iter()
            .filter(|e| e.path.top_property() == Some(name))
            .collect()
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0.into_vec()
    }
}

impl Semigroup for ValidationErrors {
    fn combine(self, other: Self) -> Self {
        ValidationErrors(self.0.combine(other.0))
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation failed with {} error(s):", self.len())?;
        for (i, error) in self.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_vec().into_iter()
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ValidationError>();
    assert_send_sync::<ValidationErrors>();
};

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(name: &str) -> ValidationError {
        ValidationError::new(
            FieldPath::from(name),
            ErrorKind::MissingRequiredProperty,
            format!("required property '{}' is missing", name),
        )
    }

    #[test]
    fn default_code_follows_kind() {
        let error = missing("name");
        assert_eq!(error.code, "required");
        assert!(error.got.is_none());
        assert!(error.part_index.is_none());
    }

    #[test]
    fn display_includes_expected_and_got() {
        let error = ValidationError::new(
            FieldPath::from("age"),
            ErrorKind::TypeMismatch,
            "wrong type",
        )
        .with_expected("integer")
        .with_got("string");

        let rendered = error.to_string();
        assert!(rendered.starts_with("age: wrong type"));
        assert!(rendered.contains("(expected: integer)"));
        assert!(rendered.contains("(got: string)"));
    }

    #[test]
    fn display_root_path() {
        let error = ValidationError::new(FieldPath::root(), ErrorKind::TypeMismatch, "bad form");
        assert_eq!(error.to_string(), "(form): bad form");
    }

    #[test]
    fn from_vec_rejects_empty() {
        assert!(ValidationErrors::from_vec(Vec::new()).is_none());
        let errors = ValidationErrors::from_vec(vec![missing("a"), missing("b")]).unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.first().path.to_string(), "a");
    }

    #[test]
    fn filters() {
        let errors = ValidationErrors::single(missing("a"))
            .combine(ValidationErrors::single(
                ValidationError::new(
                    FieldPath::from("b").index(1),
                    ErrorKind::FormatViolation,
                    "too short",
                )
                .with_code("min_length"),
            ))
            .combine(ValidationErrors::single(missing("c")));

        assert_eq!(errors.of_kind(ErrorKind::MissingRequiredProperty).len(), 2);
        assert_eq!(errors.with_code("min_length").len(), 1);
        assert_eq!(errors.for_property("b").len(), 1);
        assert_eq!(errors.at_path(&FieldPath::from("c")).len(), 1);
    }

    #[test]
    fn combine_preserves_order() {
        let combined = ValidationErrors::single(missing("x"))
            .combine(ValidationErrors::single(missing("y")))
            .combine(ValidationErrors::single(missing("z")));
        let paths: Vec<_> = combined.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["x", "y", "z"]);
    }

    #[test]
    fn display_lists_every_error() {
        let errors =
            ValidationErrors::single(missing("a")).combine(ValidationErrors::single(missing("b")));
        let rendered = errors.to_string();
        assert!(rendered.contains("2 error(s)"));
        assert!(rendered.contains("1. a: required property 'a' is missing"));
        assert!(rendered.contains("2. b: required property 'b' is missing"));
    }
}
