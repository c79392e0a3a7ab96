//! Paths into a hierarchical map.
//!
//! A [`NodePath`] is an ordered list of [`Segment`]s, each either a string key
//! into a map or an integer index into a sequence. Paths are plain values:
//! two equal paths always address the same node.
//!
//! Paths are usually written as *structured keys*, a single string joined by
//! a delimiter (`/` by default). A segment written `[N]` is the sequence
//! index `N`; everything else is a literal key.
//!
//! ```text
//! "project/views/[0]"  ->  [Key("project"), Key("views"), Index(0)]
//! ```

use std::fmt;
use std::str::FromStr;

use crate::domain::error::DomainError;

/// The default structured-key delimiter.
pub const DEFAULT_DELIMITER: &str = "/";

/// One step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    /// A key into a map.
    Key(String),
    /// A position in a sequence.
    Index(usize),
}

impl Segment {
    /// Parse a single structured-key segment.
    ///
    /// `[N]` becomes [`Segment::Index`]; anything else (including `[x]`) is a
    /// literal key.
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|digits| digits.parse::<usize>().ok())
            .map_or_else(|| Self::Key(raw.to_string()), Self::Index)
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Human-readable kind, used in type-conflict diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Key(_) => "key",
            Self::Index(_) => "index",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An address inside a hierarchical map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<Segment>);

impl NodePath {
    /// The empty path. It addresses nothing; probing it yields "not found".
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Parse a structured key using the given delimiter.
    ///
    /// # Errors
    /// `MalformedPath` if the key is empty or contains an empty segment
    /// (`"a//b"`, `"/a"`, `"a/"`).
    pub fn parse_structured(key: &str, delimiter: &str) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::MalformedPath {
                input: key.to_string(),
                reason: "structured key is empty".into(),
            });
        }
        if delimiter.is_empty() {
            return Err(DomainError::MalformedPath {
                input: key.to_string(),
                reason: "delimiter is empty".into(),
            });
        }

        key.split(delimiter)
            .map(|raw| {
                if raw.is_empty() {
                    Err(DomainError::MalformedPath {
                        input: key.to_string(),
                        reason: format!("empty segment between '{delimiter}' delimiters"),
                    })
                } else {
                    Ok(Segment::parse(raw))
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// The path without its final segment, or `None` for the empty path.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_last()
            .map(|(_, init)| Self(init.to_vec()))
    }

    /// `self` followed by every segment of `tail`.
    pub fn join(&self, tail: &NodePath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(tail.0.iter().cloned());
        Self(segments)
    }

    /// The first `len` segments of this path.
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str(DEFAULT_DELIMITER)?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_structured(s, DEFAULT_DELIMITER)
    }
}

impl From<Vec<Segment>> for NodePath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl<S: Into<Segment>, const N: usize> From<[S; N]> for NodePath {
    fn from(segments: [S; N]) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }
}
