//! Expansion of delimiter-joined map keys into nested structure.
//!
//! `{"a/b/c": 1}` becomes `{"a": {"b": {"c": 1}}}`. Keys are processed in
//! document order and the last write to a position wins, whether it came
//! from a structured key or a literal one. Sibling keys grafted under the
//! same prefix are merged, so `{"a/b": 1, "a/c": 2}` keeps both.

use tracing::trace;

use crate::domain::{
    error::DomainError,
    hmap,
    node::{Node, NodeMap},
    path::NodePath,
    provenance::Location,
};

/// Rebuild `node` with every structured key expanded.
///
/// Sequences and scalars are copied, recursing into any maps they contain.
///
/// # Errors
/// `MalformedPath` for keys with empty segments and `TypeConflict` when a
/// structured key would graft below an existing scalar.
pub fn resolve_structured_keys(node: &Node, delimiter: &str) -> Result<Node, DomainError> {
    resolve_structured_keys_located(node, delimiter, &|_| Location::none())
}

/// [`resolve_structured_keys`], citing `locate(path)` in type conflicts,
/// where `path` addresses the offending key in `node`.
pub fn resolve_structured_keys_located(
    node: &Node,
    delimiter: &str,
    locate: &dyn Fn(&NodePath) -> Location,
) -> Result<Node, DomainError> {
    resolve_at(node, delimiter, &NodePath::root(), locate)
}

fn resolve_at(
    node: &Node,
    delimiter: &str,
    base: &NodePath,
    locate: &dyn Fn(&NodePath) -> Location,
) -> Result<Node, DomainError> {
    match node {
        Node::Map(map) => resolve_map(map, delimiter, base, locate),
        Node::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| resolve_at(item, delimiter, &base.child(index), locate))
            .collect::<Result<Vec<_>, _>>()
            .map(Node::Sequence),
        scalar => Ok(scalar.clone()),
    }
}

fn resolve_map(
    map: &NodeMap,
    delimiter: &str,
    base: &NodePath,
    locate: &dyn Fn(&NodePath) -> Location,
) -> Result<Node, DomainError> {
    let mut out = Node::map();
    for (key, value) in map {
        let source = base.child(key.as_str());
        let value = resolve_at(value, delimiter, &source, locate)?;
        if key.contains(delimiter) {
            let path = NodePath::parse_structured(key, delimiter)?;
            trace!(key = %key, path = %path, "grafting structured key");
            hmap::set(&mut out, &path, value)
                .map_err(|e| e.under(base).located(locate(&source)))?;
        } else if let Node::Map(entries) = &mut out {
            // a literal key replaces whatever an earlier key put there
            entries.shift_remove(key);
            entries.insert(key.clone(), value);
        }
    }
    Ok(out)
}
