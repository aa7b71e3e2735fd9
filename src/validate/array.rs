//! Array keywords: `minItems`, `maxItems`, `uniqueItems`.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{ErrorKind, ValidationError};
use crate::path::FieldPath;
use crate::schema::SchemaNode;

pub(crate) fn check_item_count(
    node: &SchemaNode,
    count: usize,
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    let len = count as u64;
    if let Some(min) = node.min_items {
        if len < min {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("array must have at least {} items, got {}", min, count),
                )
                .with_code("min_items")
                .with_expected(format!("at least {} items", min))
                .with_got(format!("{} items", count)),
            );
        }
    }
    if let Some(max) = node.max_items {
        if len > max {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("array must have at most {} items, got {}", max, count),
                )
                .with_code("max_items")
                .with_expected(format!("at most {} items", max))
                .with_got(format!("{} items", count)),
            );
        }
    }
}

/// Reports each group of equal elements once, in order of first appearance.
pub(crate) fn check_unique(
    node: &SchemaNode,
    items: &[Value],
    path: &FieldPath,
    errors: &mut Vec<ValidationError>,
) {
    if !node.unique_items {
        return;
    }
    for indices in find_duplicates(items).values() {
        if indices.len() > 1 {
            errors.push(
                ValidationError::new(
                    path.clone(),
                    ErrorKind::FormatViolation,
                    format!("duplicate value at indices {:?}", indices),
                )
                .with_code("unique_items")
                .with_got(format!("duplicates at indices {:?}", indices)),
            );
        }
    }
}

fn find_duplicates(items: &[Value]) -> IndexMap<String, Vec<usize>> {
    let mut seen: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (i, item) in items.iter().enumerate() {
        // Value's Display is its canonical JSON text
        seen.entry(item.to_string()).or_default().push(i);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn count_bounds() {
        let node = SchemaNode::new().min_items(1).max_items(2);
        let path = FieldPath::from("tags");

        let mut errors = Vec::new();
        check_item_count(&node, 0, &path, &mut errors);
        check_item_count(&node, 2, &path, &mut errors);
        check_item_count(&node, 3, &path, &mut errors);

        let codes: Vec<_> = errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["min_items", "max_items"]);
    }

    #[test]
    fn duplicates_reported_once_per_group() {
        let node = SchemaNode::new().unique_items();
        let items = vec![json!("a"), json!("b"), json!("a"), json!("a"), json!("b")];

        let mut errors = Vec::new();
        check_unique(&node, &items, &FieldPath::from("tags"), &mut errors);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("[0, 2, 3]"));
        assert!(errors[1].message.contains("[1, 4]"));
    }

    #[test]
    fn uniqueness_off_by_default() {
        let mut errors = Vec::new();
        check_unique(
            &SchemaNode::new(),
            &[json!(1), json!(1)],
            &FieldPath::root(),
            &mut errors,
        );
        assert!(errors.is_empty());
    }
}
