//! String keywords: `minLength`, `maxLength`, `pattern`.

use crate::error::{ErrorKind, ValidationError};
use crate::path::FieldPath;
use crate::schema::SchemaNode;

/// Checks the string keywords of one member node.
///
/// Length is counted in Unicode scalar values.
pub(super) fn check_string(
    node: &SchemaNode,
    value: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    let len = value.chars().count() as u64;
    check_length(node, len, "characters", path, errors);

    if let Some(pattern) = &node.pattern {
        if !pattern.is_match(value) {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("must match pattern '{}'", pattern.as_str()),
                )
                .with_code("pattern")
                .with_expected(format!("string matching '{}'", pattern.as_str()))
                .with_got(value.to_string()),
            );
        }
    }
}

/// Checks `minLength`/`maxLength` against an already measured length.
///
/// Binary payloads are measured in bytes and come through here too.
pub(crate) fn check_length(
    node: &SchemaNode,
    len: u64,
    unit: &str,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    if let Some(min) = node.min_length {
        if len < min {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("length must be at least {}, got {}", min, len),
                )
                .with_code("min_length")
                .with_expected(format!("at least {} {}", min, unit))
                .with_got(format!("{} {}", len, unit)),
            );
        }
    }
    if let Some(max) = node.max_length {
        if len > max {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("length must be at most {}, got {}", max, len),
                )
                .with_code("max_length")
                .with_expected(format!("at most {} {}", max, unit))
                .with_got(format!("{} {}", len, unit)),
            );
        }
    }
}
