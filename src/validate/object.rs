//! Object keywords: `properties`, `required`, `additionalProperties`.

use serde_json::{Map, Value};

use crate::error::{ErrorKind, StructuralError, ValidationError};
use crate::path::FieldPath;
use crate::schema::{AdditionalProperties, FlatSchema};

use super::ValueValidator;

pub(super) fn check_object(
    validator: &ValueValidator<'_>,
    flat: &FlatSchema,
    object: &Map<String, Value>,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) -> Result<(), StructuralError> {
    for name in &flat.required {
        if !object.contains_key(name) {
            errors.push(missing_required(path.property(name.as_str()), name));
        }
    }

    for (key, value) in object {
        let key_path = path.property(key.as_str());
        match flat.property(key) {
            Some(schema) => validator.check(schema, value, &key_path, errors)?,
            None => match flat.additional_properties {
                AdditionalProperties::Deny => errors.push(unexpected_property(key_path, key)),
                AdditionalProperties::Schema(schema) => {
                    validator.check(schema, value, &key_path, errors)?
                }
                AdditionalProperties::Allow | AdditionalProperties::Unspecified => {}
            },
        }
    }
    Ok(())
}

pub(crate) fn missing_required(path: FieldPath, name: &str) -> ValidationError {
    ValidationError::new(
        path,
        ErrorKind::MissingRequiredProperty,
        format!("required property '{}' is missing", name),
    )
    .with_expected("value")
}

pub(crate) fn unexpected_property(path: FieldPath, name: &str) -> ValidationError {
    ValidationError::new(
        path,
        ErrorKind::UnexpectedProperty,
        format!("unknown property '{}'", name),
    )
}
