//! The document tree.
//!
//! Every document Shunt reads becomes a [`Node`]: scalars, sequences, and
//! string-keyed maps. Maps keep document order so that anything iterating
//! over them (structured-key grafting, directive extraction, dumping) is
//! deterministic.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Ordered mapping used for map nodes.
pub type NodeMap = IndexMap<String, Node>;

/// A value in a hierarchical map.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Node {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Node>),
    Map(NodeMap),
}

impl Node {
    pub fn map() -> Self {
        Self::Map(NodeMap::new())
    }

    pub fn sequence() -> Self {
        Self::Sequence(Vec::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::Sequence(_) | Self::Map(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Map(_) => "map",
        }
    }

    /// Scalar rendered as plain text; `None` for containers.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Null => Some("null".into()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(x) => Some(x.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Sequence(_) | Self::Map(_) => None,
        }
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Self::Sequence(items)
    }
}

impl From<NodeMap> for Node {
    fn from(map: NodeMap) -> Self {
        Self::Map(map)
    }
}

impl<K: Into<String>, V: Into<Node>> FromIterator<(K, V)> for Node {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(items) => write!(f, "<sequence of {}>", items.len()),
            Self::Map(map) => write!(f, "<map of {}>", map.len()),
            scalar => f.write_str(&scalar.scalar_text().unwrap_or_default()),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_into_map_keeps_order() {
        let node: Node = [("b", Node::Integer(1)), ("a", Node::Integer(2))]
            .into_iter()
            .collect();
        let keys: Vec<_> = node.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn serializes_like_plain_data() {
        let node: Node = [
            ("name", Node::from("demo")),
            ("tags", Node::from(vec![Node::from(true), Node::Null])),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"name":"demo","tags":[true,null]}"#);
    }

    #[test]
    fn kinds_and_scalar_text() {
        assert_eq!(Node::map().kind(), "map");
        assert_eq!(Node::Integer(3).scalar_text().as_deref(), Some("3"));
        assert!(Node::sequence().scalar_text().is_none());
    }
}
