//! `allOf` flattening.
//!
//! [`resolve`] walks a node's composition branches depth-first in declaration
//! order, then applies the node's own keywords, producing one [`FlatSchema`]
//! that the validators work from.

use indexmap::{IndexMap, IndexSet};

use crate::error::StructuralError;

use super::{AdditionalProperties, SchemaArena, SchemaId, SchemaNode, SchemaType};

/// How a property declared by more than one branch is merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergePolicy {
    /// The later declaration replaces the earlier one.
    #[default]
    LastWins,
    /// Two different sub-schemas for one name is a structural error.
    Strict,
}

/// The effective view of a (possibly composed) schema.
#[derive(Debug, Clone, Default)]
pub struct FlatSchema {
    pub schema_type: Option<SchemaType>,
    pub format: Option<String>,
    pub properties: IndexMap<String, SchemaId>,
    pub required: IndexSet<String>,
    pub additional_properties: AdditionalProperties,
    pub items: Option<SchemaId>,
    /// The node and every node it composes, in merge order. Value keywords
    /// of each member apply to the validated value.
    pub members: Vec<SchemaId>,
}

impl FlatSchema {
    /// The type used to decide how a payload is decoded.
    ///
    /// An untyped schema that declares properties is treated as an object.
    pub fn effective_type(&self) -> Option<SchemaType> {
        match self.schema_type {
            Some(schema_type) => Some(schema_type),
            None if !self.properties.is_empty() || !self.required.is_empty() => {
                Some(SchemaType::Object)
            }
            None => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.schema_type == Some(SchemaType::String) && self.format.as_deref() == Some("binary")
    }

    pub fn property(&self, name: &str) -> Option<SchemaId> {
        self.properties.get(name).copied()
    }
}

/// Flattens the schema at `id`.
///
/// Fails with `SchemaCycle` when a node is reached again through its own
/// `allOf` chain (a node shared by sibling branches is fine), and with
/// `UnsupportedComposition` when a non-object branch contributes properties
/// or when a branch points at an undefined schema.
pub fn resolve(
    arena: &SchemaArena,
    id: SchemaId,
    policy: MergePolicy,
) -> Result<FlatSchema, StructuralError> {
    let mut resolver = Resolver {
        arena,
        policy,
        root: id,
        stack: Vec::new(),
        flat: FlatSchema::default(),
    };
    resolver.visit(id)?;
    tracing::debug!(
        schema = %arena.describe(id),
        properties = resolver.flat.properties.len(),
        required = resolver.flat.required.len(),
        members = resolver.flat.members.len(),
        "resolved schema composition"
    );
    Ok(resolver.flat)
}

struct Resolver<'a> {
    arena: &'a SchemaArena,
    policy: MergePolicy,
    root: SchemaId,
    stack: Vec<SchemaId>,
    flat: FlatSchema,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, id: SchemaId) -> Result<(), StructuralError> {
        if self.stack.contains(&id) {
            return Err(StructuralError::SchemaCycle {
                schema: self.arena.describe(id),
            });
        }
        let node = self.node(id)?;

        self.stack.push(id);
        for branch in &node.all_of {
            let branch_node = self.node(*branch)?;
            if contributes_non_object_properties(branch_node) {
                return Err(StructuralError::UnsupportedComposition {
                    schema: self.arena.describe(self.root),
                    reason: format!(
                        "allOf branch {} has type '{}' but declares properties",
                        self.arena.describe(*branch),
                        branch_node
                            .schema_type
                            .map(SchemaType::as_str)
                            .unwrap_or("any"),
                    ),
                });
            }
            self.visit(*branch)?;
        }
        self.stack.pop();

        self.merge_own(id, node)
    }

    fn node(&self, id: SchemaId) -> Result<&'a SchemaNode, StructuralError> {
        self.arena
            .get(id)
            .ok_or_else(|| StructuralError::UnsupportedComposition {
                schema: self.arena.describe(self.root),
                reason: format!("reference to undefined schema {}", self.arena.describe(id)),
            })
    }

    fn merge_own(&mut self, id: SchemaId, node: &SchemaNode) -> Result<(), StructuralError> {
        for (name, schema) in &node.properties {
            match self.flat.properties.get(name) {
                Some(existing) if *existing != *schema && self.policy == MergePolicy::Strict => {
                    return Err(StructuralError::PropertyConflict {
                        schema: self.arena.describe(self.root),
                        property: name.clone(),
                    });
                }
                _ => {
                    self.flat.properties.insert(name.clone(), *schema);
                }
            }
        }
        for name in &node.required {
            self.flat.required.insert(name.clone());
        }

        if node.schema_type.is_some() {
            self.flat.schema_type = node.schema_type;
        }
        if node.format.is_some() {
            self.flat.format = node.format.clone();
        }
        if node.items.is_some() {
            self.flat.items = node.items;
        }
        if node.additional_properties.is_specified() {
            self.flat.additional_properties = node.additional_properties;
        }
        if !self.flat.members.contains(&id) {
            self.flat.members.push(id);
        }
        Ok(())
    }
}

fn contributes_non_object_properties(node: &SchemaNode) -> bool {
    match node.schema_type {
        Some(SchemaType::Object) | None => false,
        Some(_) => !node.properties.is_empty() || !node.required.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn leaf_resolves_to_itself() {
        let mut arena = SchemaArena::new();
        let id = arena.insert(SchemaNode::binary());
        let flat = resolve(&arena, id, MergePolicy::LastWins).unwrap();
        assert!(flat.is_binary());
        assert_eq!(flat.members, vec![id]);
        assert!(flat.properties.is_empty());
    }

    #[test]
    fn branches_merge_before_own_properties() {
        let mut arena = SchemaArena::new();
        let a = arena.insert(SchemaNode::string());
        let b = arena.insert(SchemaNode::integer());
        let branch = arena.insert(SchemaNode::object().property("x", a).property("y", a));
        let root = arena.insert(SchemaNode::object().all_of(branch).property("x", b));

        let flat = resolve(&arena, root, MergePolicy::LastWins).unwrap();
        let names: Vec<_> = flat.properties.keys().cloned().collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(flat.property("x"), Some(b));
        assert_eq!(flat.members, vec![branch, root]);
    }

    #[test]
    fn strict_rejects_conflicting_definitions() {
        let mut arena = SchemaArena::new();
        let a = arena.insert(SchemaNode::string());
        let b = arena.insert(SchemaNode::integer());
        let left = arena.insert(SchemaNode::object().property("x", a));
        let right = arena.insert(SchemaNode::object().property("x", b));
        let root = arena.insert(SchemaNode::object().all_of(left).all_of(right));

        let err = resolve(&arena, root, MergePolicy::Strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PropertyConflict);
    }

    #[test]
    fn strict_accepts_same_schema_twice() {
        let mut arena = SchemaArena::new();
        let a = arena.insert(SchemaNode::string());
        let left = arena.insert(SchemaNode::object().property("x", a));
        let right = arena.insert(SchemaNode::object().property("x", a));
        let root = arena.insert(SchemaNode::object().all_of(left).all_of(right));

        assert!(resolve(&arena, root, MergePolicy::Strict).is_ok());
    }

    #[test]
    fn self_composition_is_a_cycle() {
        let mut arena = SchemaArena::new();
        let a = arena.reserve("A");
        let b = arena.define("B", SchemaNode::object().all_of(a)).unwrap();
        arena.set(a, SchemaNode::object().all_of(b)).unwrap();

        let err = resolve(&arena, a, MergePolicy::LastWins).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaCycle);
        assert!(err.to_string().contains('A'));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut arena = SchemaArena::new();
        let s = arena.insert(SchemaNode::string());
        let base = arena.insert(SchemaNode::object().property("id", s).required("id"));
        let left = arena.insert(SchemaNode::object().all_of(base));
        let right = arena.insert(SchemaNode::object().all_of(base));
        let root = arena.insert(SchemaNode::object().all_of(left).all_of(right));

        let flat = resolve(&arena, root, MergePolicy::Strict).unwrap();
        assert_eq!(flat.required.len(), 1);
        assert_eq!(flat.members.iter().filter(|m| **m == base).count(), 1);
    }

    #[test]
    fn recursive_property_is_not_a_cycle() {
        let mut arena = SchemaArena::new();
        let node = arena.reserve("Node");
        let children = arena.insert(SchemaNode::array(node));
        arena
            .set(node, SchemaNode::object().property("children", children))
            .unwrap();

        assert!(resolve(&arena, node, MergePolicy::LastWins).is_ok());
    }

    #[test]
    fn bare_string_fragment_is_accepted() {
        let mut arena = SchemaArena::new();
        let fragment = arena.insert(SchemaNode::string().min_length(2));
        let root = arena.insert(SchemaNode::new().all_of(fragment));

        let flat = resolve(&arena, root, MergePolicy::LastWins).unwrap();
        assert_eq!(flat.schema_type, Some(SchemaType::String));
        assert_eq!(flat.members, vec![fragment, root]);
    }

    #[test]
    fn non_object_branch_with_properties_is_rejected() {
        let mut arena = SchemaArena::new();
        let s = arena.insert(SchemaNode::string());
        let fragment = arena.insert(SchemaNode::string().property("x", s));
        let root = arena.insert(SchemaNode::object().all_of(fragment));

        let err = resolve(&arena, root, MergePolicy::LastWins).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedComposition);
    }

    #[test]
    fn undefined_branch_is_rejected() {
        let mut arena = SchemaArena::new();
        let missing = arena.reserve("Missing");
        let root = arena.insert(SchemaNode::object().all_of(missing));

        let err = resolve(&arena, root, MergePolicy::LastWins).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedComposition);
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn additional_properties_last_setting_wins() {
        let mut arena = SchemaArena::new();
        let branch =
            arena.insert(SchemaNode::object().additional_properties(AdditionalProperties::Allow));
        let root = arena.insert(
            SchemaNode::object()
                .all_of(branch)
                .additional_properties(AdditionalProperties::Deny),
        );
        let flat = resolve(&arena, root, MergePolicy::LastWins).unwrap();
        assert_eq!(flat.additional_properties, AdditionalProperties::Deny);

        let open = arena.insert(SchemaNode::object().all_of(branch));
        let flat = resolve(&arena, open, MergePolicy::LastWins).unwrap();
        assert_eq!(flat.additional_properties, AdditionalProperties::Allow);
    }

    #[test]
    fn untyped_with_properties_is_object() {
        let mut arena = SchemaArena::new();
        let s = arena.insert(SchemaNode::string());
        let root = arena.insert(SchemaNode::new().property("a", s));
        let flat = resolve(&arena, root, MergePolicy::LastWins).unwrap();
        assert_eq!(flat.effective_type(), Some(SchemaType::Object));
    }
}
