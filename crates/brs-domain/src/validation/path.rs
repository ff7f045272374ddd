//! JSON path value object used as validation error context

use std::collections::VecDeque;
use std::fmt;

/// One step from a container to a contained value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object property, rendered as `.name`
    Field(String),
    /// Array element, rendered as `[index]`
    Index(usize),
    /// Object key itself (not its value), rendered as `@key=name`
    Key(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, "@key={key}"),
        }
    }
}

/// Relative path from the value a validator was applied to.
///
/// Segments are stored outermost first. Errors build paths from the inside
/// out, so the only mutation offered is [`JsonPath::prepend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: VecDeque<PathSegment>,
}

impl JsonPath {
    /// Create an empty (root-relative) path
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Add a segment in front of the existing ones
    pub fn prepend(&mut self, segment: PathSegment) {
        self.segments.push_front(segment);
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<PathSegment> for JsonPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}
