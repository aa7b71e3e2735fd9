//! Numeric keywords: `minimum`, `maximum` (with the boolean exclusive flags)
//! and `multipleOf`.

use serde_json::Number;

use crate::error::{ErrorKind, ValidationError};
use crate::path::FieldPath;
use crate::schema::SchemaNode;

const MULTIPLE_OF_EPSILON: f64 = 1e-9;

pub(super) fn check_number(
    node: &SchemaNode,
    number: &Number,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    let Some(value) = number.as_f64() else {
        return;
    };

    if let Some(min) = node.minimum {
        let violated = if node.exclusive_minimum {
            value <= min
        } else {
            value < min
        };
        if violated {
            let bound = if node.exclusive_minimum {
                format!("greater than {}", min)
            } else {
                format!("at least {}", min)
            };
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("value must be {}, got {}", bound, number),
                )
                .with_code("min_value")
                .with_expected(bound)
                .with_got(number.to_string()),
            );
        }
    }

    if let Some(max) = node.maximum {
        let violated = if node.exclusive_maximum {
            value >= max
        } else {
            value > max
        };
        if violated {
            let bound = if node.exclusive_maximum {
                format!("less than {}", max)
            } else {
                format!("at most {}", max)
            };
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("value must be {}, got {}", bound, number),
                )
                .with_code("max_value")
                .with_expected(bound)
                .with_got(number.to_string()),
            );
        }
    }

    if let Some(divisor) = node.multiple_of {
        let quotient = value / divisor;
        if (quotient - quotient.round()).abs() > MULTIPLE_OF_EPSILON {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("value must be a multiple of {}", divisor),
                )
                .with_code("multiple_of")
                .with_expected(format!("multiple of {}", divisor))
                .with_got(number.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(node: &SchemaNode, value: serde_json::Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let serde_json::Value::Number(number) = value else {
            panic!("expected a number");
        };
        check_number(node, &number, &FieldPath::from("n"), &mut errors);
        errors
    }

    #[test]
    fn inclusive_bounds() {
        let node = SchemaNode::integer().minimum(1.0).maximum(10.0);
        assert!(run(&node, json!(1)).is_empty());
        assert!(run(&node, json!(10)).is_empty());
        assert_eq!(run(&node, json!(0))[0].code, "min_value");
        assert_eq!(run(&node, json!(11))[0].code, "max_value");
    }

    #[test]
    fn exclusive_bounds() {
        let node = SchemaNode::number()
            .minimum(0.0)
            .exclusive_minimum(true)
            .maximum(1.0)
            .exclusive_maximum(true);
        assert!(run(&node, json!(0.5)).is_empty());

        let errors = run(&node, json!(0));
        assert_eq!(errors[0].expected.as_deref(), Some("greater than 0"));
        assert_eq!(run(&node, json!(1)).len(), 1);
    }

    #[test]
    fn multiple_of_tolerates_float_noise() {
        let node = SchemaNode::number().multiple_of(0.1);
        assert!(run(&node, json!(0.3)).is_empty());
        assert_eq!(run(&node, json!(0.35))[0].code, "multiple_of");
    }
}
