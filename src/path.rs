//! Locations of offending values inside a decoded form.
//!
//! A [`FieldPath`] starts at the form itself and descends through part names,
//! occurrence indices of repeated parts, and then into the JSON payload of a
//! structured part, e.g. `categories[1].name`.

use std::fmt::{self, Display};

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A form property or JSON object key.
    Property(String),
    /// An element of a repeated part or JSON array.
    Index(usize),
}

/// Path from the form root to a property, part occurrence, or nested value.
///
/// # Example
///
/// ```rust
/// use formcheck::FieldPath;
///
/// let path = FieldPath::root().property("categories").index(1).property("name");
/// assert_eq!(path.to_string(), "categories[1].name");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The form itself.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a copy of this path extended by a property step.
    pub fn property(&self, name: impl Into<String>) -> Self {
        self.with(PathSegment::Property(name.into()))
    }

    /// Returns a copy of this path extended by an index step.
    pub fn index(&self, index: usize) -> Self {
        self.with(PathSegment::Index(index))
    }

    fn with(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The form property this path starts with, if any.
    pub fn top_property(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Property(name)) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for FieldPath {
    fn from(name: &str) -> Self {
        FieldPath::root().property(name)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Property(name) if i == 0 => f.write_str(name)?,
                PathSegment::Property(name) => write!(f, ".{}", name)?,
                PathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}
