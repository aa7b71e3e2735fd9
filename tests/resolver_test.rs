//! Integration tests for allOf flattening.

use formcheck::{
    parse_schema, AdditionalProperties, ErrorKind, MergePolicy, SchemaArena, SchemaNode,
    SchemaType,
};
use serde_json::json;

#[test]
fn test_disjoint_branches_union() {
    let mut arena = SchemaArena::new();
    let s = arena.insert(SchemaNode::string());
    let left = arena.insert(SchemaNode::object().property("a", s).required("a"));
    let right = arena.insert(SchemaNode::object().property("b", s).required("b"));
    let root = arena.insert(SchemaNode::object().all_of(left).all_of(right).required("c"));

    let flat = arena.resolve(root, MergePolicy::LastWins).unwrap();
    let names: Vec<_> = flat.properties.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["a", "b"]);
    let required: Vec<_> = flat.required.iter().map(String::as_str).collect();
    assert_eq!(required, vec!["a", "b", "c"]);
    assert_eq!(flat.effective_type(), Some(SchemaType::Object));
}

#[test]
fn test_diamond_composition_resolves() {
    let mut arena = SchemaArena::new();
    let s = arena.insert(SchemaNode::string());
    let base = arena.insert(SchemaNode::object().property("id", s).required("id"));
    let left = arena.insert(SchemaNode::object().all_of(base));
    let right = arena.insert(SchemaNode::object().all_of(base));
    let root = arena.insert(SchemaNode::object().all_of(left).all_of(right));

    for policy in [MergePolicy::LastWins, MergePolicy::Strict] {
        let flat = arena.resolve(root, policy).unwrap();
        assert_eq!(flat.properties.len(), 1);
        assert_eq!(flat.required.len(), 1);
    }
}

#[test]
fn test_self_referencing_composition_is_a_cycle() {
    let mut arena = SchemaArena::new();
    let looped = arena.reserve("Looped");
    arena
        .set(looped, SchemaNode::object().all_of(looped))
        .unwrap();

    let err = arena.resolve(looped, MergePolicy::LastWins).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaCycle);
    assert!(err.to_string().contains("Looped"));
}

#[test]
fn test_recursive_property_is_not_a_cycle() {
    let mut arena = SchemaArena::new();
    let node = arena.reserve("Node");
    let children = arena.insert(SchemaNode::array(node));
    arena
        .set(node, SchemaNode::object().property("children", children))
        .unwrap();

    let flat = arena.resolve(node, MergePolicy::Strict).unwrap();
    assert_eq!(flat.property("children"), Some(children));
}

#[test]
fn test_collision_last_wins_and_strict() {
    let mut arena = SchemaArena::new();
    let text = arena.insert(SchemaNode::string());
    let number = arena.insert(SchemaNode::integer());
    let left = arena.insert(SchemaNode::object().property("name", text));
    let right = arena.insert(SchemaNode::object().property("name", number));
    let root = arena.insert(SchemaNode::object().all_of(left).all_of(right));

    let flat = arena.resolve(root, MergePolicy::LastWins).unwrap();
    assert_eq!(flat.property("name"), Some(number));

    let err = arena.resolve(root, MergePolicy::Strict).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PropertyConflict);
}

#[test]
fn test_non_object_branch_with_properties_is_unsupported() {
    let mut arena = SchemaArena::new();
    let s = arena.insert(SchemaNode::string());
    let odd = arena.insert(SchemaNode::string().property("x", s));
    let root = arena.insert(SchemaNode::object().all_of(odd));

    let err = arena.resolve(root, MergePolicy::LastWins).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedComposition);
}

#[test]
fn test_parsed_schema_keeps_additional_properties() {
    let mut arena = SchemaArena::new();
    let root = parse_schema(
        &mut arena,
        &json!({
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"additionalProperties": false}
            ]
        }),
        "#",
    )
    .unwrap();

    let flat = arena.resolve(root, MergePolicy::LastWins).unwrap();
    assert_eq!(flat.additional_properties, AdditionalProperties::Deny);
    assert_eq!(flat.schema_type, Some(SchemaType::Object));
}
