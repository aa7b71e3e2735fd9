//! Folding validated parts into the form object.

use std::io::Read;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use stillwater::Validation;

use crate::error::{StructuralError, ValidationError, ValidationErrors};
use crate::multipart::{MultipartReader, Part};
use crate::options::{UnknownParts, ValidatorOptions};
use crate::path::FieldPath;
use crate::request::Encoding;
use crate::schema::{AdditionalProperties, FlatSchema, SchemaArena, SchemaType};
use crate::validate::{missing_required, unexpected_property, ValueValidator};
use crate::ValidationResult;

use super::{FormData, PartValidator, PartValue};

/// Correlates parts with the properties of an object schema.
///
/// Parts are fed in stream order through [`accept`](Self::accept);
/// [`finish`](Self::finish) then applies the checks that need the whole form
/// (required properties, item counts of repeated fields).
pub struct FormAggregator<'a> {
    flat: Arc<FlatSchema>,
    values: ValueValidator<'a>,
    parts: PartValidator<'a>,
    unknown_parts: UnknownParts,
    encoding: Option<&'a IndexMap<String, Encoding>>,
    /// Array-typed properties seen so far, with their resolved schema.
    arrays: IndexMap<String, Arc<FlatSchema>>,
    form: FormData,
    errors: Vec<ValidationError>,
    max_form_bytes: usize,
    /// Text and JSON payload bytes retained in `form`.
    buffered_bytes: usize,
}

impl<'a> FormAggregator<'a> {
    pub fn new(arena: &'a SchemaArena, flat: Arc<FlatSchema>, options: &ValidatorOptions) -> Self {
        let values = ValueValidator::new(arena, options.merge_policy());
        Self {
            flat,
            values,
            parts: PartValidator::new(values, options.max_buffered_part_bytes()),
            unknown_parts: options.unknown_parts(),
            encoding: None,
            arrays: IndexMap::new(),
            form: FormData::new(),
            errors: Vec::new(),
            max_form_bytes: options.max_buffered_form_bytes(),
            buffered_bytes: 0,
        }
    }

    /// Per-property encoding of the media type, used for content type checks.
    pub fn with_encoding(mut self, encoding: &'a IndexMap<String, Encoding>) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Validates one part and records its value.
    ///
    /// Per-field problems are collected; only structural problems are returned.
    pub fn accept<R: Read>(&mut self, part: &mut Part<'_, R>) -> Result<(), StructuralError> {
        let name = part.name().to_string();
        let index = part.index();
        let allowed = self
            .encoding
            .and_then(|encoding| encoding.get(&name))
            .and_then(|encoding| encoding.content_type.as_deref());

        let (schema, path) = match self.flat.property(&name) {
            Some(id) => {
                let property = self.values.arena().resolve(id, self.values.policy())?;
                if property.effective_type() == Some(SchemaType::Array) {
                    let position = self.form.get_all(&name).len();
                    let items = match property.items {
                        Some(items) => self.values.arena().resolve(items, self.values.policy())?,
                        None => Arc::new(FlatSchema::default()),
                    };
                    self.arrays.entry(name.clone()).or_insert(property);
                    (items, FieldPath::from(name.as_str()).index(position))
                } else {
                    (property, FieldPath::from(name.as_str()))
                }
            }
            None => match self.unknown_schema()? {
                Some(schema) => (schema, FieldPath::from(name.as_str())),
                None => {
                    tracing::debug!(index, name = %name, "rejecting unknown multipart part");
                    self.errors.push(
                        unexpected_property(FieldPath::from(name.as_str()), &name)
                            .with_part_index(index),
                    );
                    part.skip()?;
                    return Ok(());
                }
            },
        };

        let remaining = self.max_form_bytes.saturating_sub(self.buffered_bytes);
        let outcome = self
            .parts
            .with_form_budget(remaining, self.max_form_bytes)
            .validate_part(part, &schema, &path, allowed)?;
        tracing::debug!(
            index,
            name = %name,
            content_type = part.content_type(),
            buffered = outcome.buffered_bytes,
            errors = outcome.errors.len(),
            "validated multipart part"
        );
        self.buffered_bytes += outcome.buffered_bytes;
        self.errors.extend(outcome.errors);
        self.form.push(name, outcome.value);
        Ok(())
    }

    /// Schema for a part whose name is not a declared property, or `None`
    /// if such parts are rejected.
    fn unknown_schema(&self) -> Result<Option<Arc<FlatSchema>>, StructuralError> {
        if self.unknown_parts == UnknownParts::Reject {
            return Ok(None);
        }
        match self.flat.additional_properties {
            AdditionalProperties::Deny => Ok(None),
            AdditionalProperties::Schema(id) => {
                Ok(Some(self.values.arena().resolve(id, self.values.policy())?))
            }
            AdditionalProperties::Allow | AdditionalProperties::Unspecified => {
                Ok(Some(Arc::new(FlatSchema::default())))
            }
        }
    }

    /// Applies whole-form checks and produces the verdict.
    pub fn finish(mut self) -> ValidationResult<FormData> {
        for (name, array) in &self.arrays {
            let occurrences = self.form.get_all(name);
            let decoded: Vec<Value> = occurrences
                .iter()
                .filter_map(PartValue::as_value)
                .cloned()
                .collect();
            self.values.check_collected(
                array,
                occurrences.len(),
                &decoded,
                &FieldPath::from(name.as_str()),
                &mut self.errors,
            );
        }

        for name in &self.flat.required {
            if !self.form.contains(name) {
                self.errors
                    .push(missing_required(FieldPath::from(name.as_str()), name));
            }
        }

        match ValidationErrors::from_vec(self.errors) {
            Some(errors) => Validation::Failure(errors),
            None => Validation::Success(self.form),
        }
    }
}

/// Drives `reader` to the end, feeding every part to `aggregator`.
pub fn aggregate<R: Read>(
    reader: &mut MultipartReader<R>,
    mut aggregator: FormAggregator<'_>,
) -> Result<ValidationResult<FormData>, StructuralError> {
    while let Some(mut part) = reader.next_part()? {
        aggregator.accept(&mut part)?;
    }
    Ok(aggregator.finish())
}
