//! Arena storage for schema nodes and memoized resolutions.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;

use crate::error::StructuralError;

use super::resolve::{resolve, FlatSchema, MergePolicy};
use super::SchemaNode;

/// Handle of a node inside a [`SchemaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(usize);

impl SchemaId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type ResolutionCache = RwLock<HashMap<(SchemaId, MergePolicy), Arc<FlatSchema>>>;

/// Owns every schema node of a document.
///
/// Nodes are appended and never removed. Named component schemas can be
/// reserved before they are defined, which is how forward and recursive
/// `$ref`s are wired up by the loader.
///
/// # Thread Safety
///
/// Once built, an arena is shared as `Arc<SchemaArena>` and only read.
/// Successful resolutions are memoized with populate-once semantics behind a
/// `parking_lot::RwLock`; lookups take the read lock only. Any `&mut`
/// modification clears the memo.
pub struct SchemaArena {
    nodes: Vec<Option<SchemaNode>>,
    names: IndexMap<String, SchemaId>,
    cache: ResolutionCache,
}

impl SchemaArena {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            names: IndexMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Stores an anonymous node.
    pub fn insert(&mut self, node: SchemaNode) -> SchemaId {
        self.cache.get_mut().clear();
        self.nodes.push(Some(node));
        SchemaId(self.nodes.len() - 1)
    }

    /// Stores a node under a component name.
    ///
    /// A name that was only [`reserve`](Self::reserve)d is filled in; a name
    /// that is already defined is an error.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        node: SchemaNode,
    ) -> Result<SchemaId, ArenaError> {
        let name = name.into();
        let id = self.reserve(name.clone());
        let slot = self.slot_mut(id)?;
        if slot.is_some() {
            return Err(ArenaError::DuplicateName(name));
        }
        *slot = Some(node);
        self.cache.get_mut().clear();
        Ok(id)
    }

    /// Returns the id for a component name, creating an empty slot if needed.
    pub fn reserve(&mut self, name: impl Into<String>) -> SchemaId {
        let name = name.into();
        if let Some(id) = self.names.get(&name) {
            return *id;
        }
        self.nodes.push(None);
        let id = SchemaId(self.nodes.len() - 1);
        self.names.insert(name, id);
        id
    }

    /// Replaces the node behind an id.
    ///
    /// Fails for an id this arena never handed out.
    pub fn set(&mut self, id: SchemaId, node: SchemaNode) -> Result<(), ArenaError> {
        *self.slot_mut(id)? = Some(node);
        self.cache.get_mut().clear();
        Ok(())
    }

    fn slot_mut(&mut self, id: SchemaId) -> Result<&mut Option<SchemaNode>, ArenaError> {
        self.nodes.get_mut(id.0).ok_or(ArenaError::UnknownId(id))
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn by_name(&self, name: &str) -> Option<SchemaId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: SchemaId) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, named)| **named == id)
            .map(|(name, _)| name.as_str())
    }

    /// Human-readable label: the component name, or `#index`.
    pub fn describe(&self, id: SchemaId) -> String {
        match self.name_of(id) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        }
    }

    /// Names that were referenced but never defined, sorted.
    pub fn unresolved(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .names
            .iter()
            .filter(|(_, id)| self.get(**id).is_none())
            .map(|(name, _)| name.clone())
            .collect();
        missing.sort();
        missing
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves `allOf` composition for `id`, memoizing the result.
    ///
    /// Failures are not memoized; resolution is deterministic so they recur.
    pub fn resolve(
        &self,
        id: SchemaId,
        policy: MergePolicy,
    ) -> Result<Arc<FlatSchema>, StructuralError> {
        if let Some(flat) = self.cache.read().get(&(id, policy)) {
            tracing::trace!(schema = %id, "resolution cache hit");
            return Ok(Arc::clone(flat));
        }

        let flat = Arc::new(resolve(self, id, policy)?);
        let mut cache = self.cache.write();
        let entry = cache.entry((id, policy)).or_insert(flat);
        Ok(Arc::clone(entry))
    }

    #[cfg(test)]
    pub(crate) fn cached_resolutions(&self) -> usize {
        self.cache.read().len()
    }
}

impl Default for SchemaArena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaArena")
            .field("nodes", &self.nodes.len())
            .field("names", &self.names.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Errors raised while building an arena.
#[derive(Debug, thiserror::Error)]
pub enum ArenaError {
    #[error("schema '{0}' already defined")]
    DuplicateName(String),

    #[error("schema id {0} does not belong to this arena")]
    UnknownId(SchemaId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_define_keeps_id() {
        let mut arena = SchemaArena::new();
        let reserved = arena.reserve("Category");
        assert!(arena.get(reserved).is_none());
        assert_eq!(arena.unresolved(), vec!["Category".to_string()]);

        let defined = arena.define("Category", SchemaNode::object()).unwrap();
        assert_eq!(reserved, defined);
        assert!(arena.unresolved().is_empty());
        assert_eq!(arena.describe(defined), "Category");
    }

    #[test]
    fn define_twice_fails() {
        let mut arena = SchemaArena::new();
        arena.define("A", SchemaNode::string()).unwrap();
        let err = arena.define("A", SchemaNode::string()).unwrap_err();
        assert!(matches!(err, ArenaError::DuplicateName(ref name) if name == "A"));
    }

    #[test]
    fn foreign_id_is_an_error() {
        let mut other = SchemaArena::new();
        other.insert(SchemaNode::string());
        let foreign = other.insert(SchemaNode::string());

        let mut arena = SchemaArena::new();
        let err = arena.set(foreign, SchemaNode::integer()).unwrap_err();
        assert!(matches!(err, ArenaError::UnknownId(id) if id == foreign));
        assert!(arena.is_empty());
    }

    #[test]
    fn anonymous_nodes_describe_by_index() {
        let mut arena = SchemaArena::new();
        let id = arena.insert(SchemaNode::string());
        assert_eq!(arena.describe(id), format!("#{}", id.index()));
        assert_eq!(arena.name_of(id), None);
    }

    #[test]
    fn resolve_is_memoized_and_cleared_on_mutation() {
        let mut arena = SchemaArena::new();
        let name = arena.insert(SchemaNode::string());
        let root = arena.insert(SchemaNode::object().property("name", name));

        let first = arena.resolve(root, MergePolicy::LastWins).unwrap();
        let second = arena.resolve(root, MergePolicy::LastWins).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(arena.cached_resolutions(), 1);

        arena.insert(SchemaNode::integer());
        assert_eq!(arena.cached_resolutions(), 0);
    }

    #[test]
    fn policies_are_cached_separately() {
        let mut arena = SchemaArena::new();
        let root = arena.insert(SchemaNode::object());
        arena.resolve(root, MergePolicy::LastWins).unwrap();
        arena.resolve(root, MergePolicy::Strict).unwrap();
        assert_eq!(arena.cached_resolutions(), 2);
    }
}
