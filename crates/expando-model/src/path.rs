//! Node paths for diagnostics and hook naming
//!
//! Provides [`NodePath`], the dotted/indexed address of a node reached during
//! a walk (`Root.Address.City`, `Root.Items[2]`, `Root.Tags[home]`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Root segment every walk starts from
pub const ROOT: &str = "Root";

/// One step below a node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Named field of a composite
    Field(String),
    /// Position in a sequence
    Index(usize),
    /// Entry of a keyed collection, by the key's text form
    Key(String),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Index(i) => write!(f, "[{i}]"),
            Self::Key(k) => write!(f, "[{k}]"),
        }
    }
}

/// Path from the walk root to a node
///
/// # Examples
/// - `Root` → the root itself
/// - `Root.Invoice.Items[0].Code` → field `Code` of the first item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<Segment>);

impl NodePath {
    /// The root path
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path segments below the root
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments below the root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Parent path (if not root)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Append a field segment, returning new path
    #[must_use]
    pub fn field(&self, name: impl Into<String>) -> Self {
        self.with(Segment::Field(name.into()))
    }

    /// Append an index segment, returning new path
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        self.with(Segment::Index(index))
    }

    /// Append a key segment, returning new path
    #[must_use]
    pub fn key(&self, key: impl Display) -> Self {
        self.with(Segment::Key(key.to_string()))
    }

    fn with(&self, segment: Segment) -> Self {
        let mut new = self.clone();
        new.0.push(segment);
        new
    }

    /// Iterator over segments from root to leaf
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.0.iter()
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT)?;
        for segment in &self.0 {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(ROOT)
            .ok_or_else(|| PathError::MissingRoot(s.to_string()))?;

        let mut segments = Vec::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            match c {
                '.' => {
                    let mut end = rest.len();
                    while let Some(&(i, next)) = chars.peek() {
                        if next == '.' || next == '[' {
                            end = i;
                            break;
                        }
                        chars.next();
                    }
                    let name = &rest[start + 1..end];
                    if name.is_empty() {
                        return Err(PathError::EmptySegment);
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                '[' => {
                    let close = rest[start..]
                        .find(']')
                        .map(|offset| start + offset)
                        .ok_or(PathError::Unclosed)?;
                    let inner = &rest[start + 1..close];
                    if inner.is_empty() {
                        return Err(PathError::EmptySegment);
                    }
                    segments.push(
                        inner
                            .parse::<usize>()
                            .map_or_else(|_| Segment::Key(inner.to_string()), Segment::Index),
                    );
                    while chars.peek().is_some_and(|&(i, _)| i <= close) {
                        chars.next();
                    }
                }
                other => return Err(PathError::UnexpectedChar(other)),
            }
        }
        Ok(Self(segments))
    }
}

/// Errors related to node paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path '{0}' does not start at Root")]
    MissingRoot(String),

    #[error("path contains empty segment")]
    EmptySegment,

    #[error("unclosed '[' in path")]
    Unclosed,

    #[error("unexpected character '{0}' in path")]
    UnexpectedChar(char),
}
