//! Path-addressed access to a [`Node`] tree ("hmap").
//!
//! All accessors go through [`probe`] or [`probe_for_write`], which walk a path and **create**
//! missing intermediate containers on the way down. This is a documented
//! side effect: `get` and `has` may grow the tree even when they report that
//! nothing is there. Callers that need a pure read should clone first.
//!
//! The container created for a missing intermediate is chosen by the *next*
//! segment: a sequence if it is an index, a map otherwise. Sequences are
//! padded with nulls up to the index being reached. Reads stop at a null
//! intermediate; writes replace it with the container the path needs.

use crate::domain::{
    error::DomainError,
    node::Node,
    path::{NodePath, Segment},
    provenance::Location,
};

/// Outcome of walking a path.
#[derive(Debug)]
pub enum Probe<'a> {
    /// The container that holds (or would hold) the terminal segment.
    Found {
        container: &'a mut Node,
        segment: &'a Segment,
    },
    /// The path is empty or runs through a null node.
    NotFound,
}

fn container_for(next: &Segment) -> Node {
    if next.is_index() {
        Node::sequence()
    } else {
        Node::map()
    }
}

fn type_conflict(path: &NodePath, depth: usize, segment: &Segment, found: &Node) -> DomainError {
    DomainError::TypeConflict {
        path: path.prefix(depth),
        segment: segment.to_string(),
        segment_kind: segment.kind(),
        found: found.kind(),
        location: Location::none(),
    }
}

/// Walk `path` from `root`, creating intermediate containers as needed.
///
/// Reads stop at a null node and report [`Probe::NotFound`].
///
/// # Errors
/// `TypeConflict` when an existing node has the wrong type for the segment
/// applied to it (index into a map, key into a sequence, anything into a
/// scalar).
pub fn probe<'a>(root: &'a mut Node, path: &'a NodePath) -> Result<Probe<'a>, DomainError> {
    descend(root, path, false)
}

/// Like [`probe`], but a null below the root is replaced by the container
/// the following segment needs. Only a null root yields [`Probe::NotFound`].
pub fn probe_for_write<'a>(
    root: &'a mut Node,
    path: &'a NodePath,
) -> Result<Probe<'a>, DomainError> {
    descend(root, path, true)
}

fn descend<'a>(
    root: &'a mut Node,
    path: &'a NodePath,
    fill_nulls: bool,
) -> Result<Probe<'a>, DomainError> {
    let Some((last, init)) = path.segments().split_last() else {
        return Ok(Probe::NotFound);
    };
    if root.is_null() {
        return Ok(Probe::NotFound);
    }

    let mut node = root;
    for (depth, segment) in init.iter().enumerate() {
        let next = &path.segments()[depth + 1];
        node = match (node, segment) {
            (Node::Map(map), Segment::Key(key)) => map
                .entry(key.clone())
                .or_insert_with(|| container_for(next)),
            (Node::Sequence(items), Segment::Index(index)) => {
                if items.len() < *index {
                    items.resize(*index, Node::Null);
                }
                if items.len() == *index {
                    items.push(container_for(next));
                }
                &mut items[*index]
            }
            (other, segment) => return Err(type_conflict(path, depth, segment, other)),
        };
        if node.is_null() {
            if !fill_nulls {
                return Ok(Probe::NotFound);
            }
            *node = container_for(next);
        }
    }

    let fits = matches!(
        (&*node, last),
        (Node::Map(_), Segment::Key(_)) | (Node::Sequence(_), Segment::Index(_))
    );
    if fits {
        Ok(Probe::Found {
            container: node,
            segment: last,
        })
    } else {
        Err(type_conflict(path, init.len(), last, node))
    }
}

/// Value at `path`, or `default` when the terminal position is unset.
///
/// May auto-vivify intermediate nodes (see module docs).
pub fn get(root: &mut Node, path: &NodePath, default: Node) -> Result<Node, DomainError> {
    Ok(match probe(root, path)? {
        Probe::Found { container, segment } => {
            lookup(container, segment).cloned().unwrap_or(default)
        }
        Probe::NotFound => default,
    })
}

/// Assign `value` at `path`, returning whatever was there before.
///
/// # Errors
/// - `MalformedPath` for the empty path
/// - `ProbeOnNullContainer` when the root itself is null
/// - `TypeConflict` as for [`probe`]
pub fn set(root: &mut Node, path: &NodePath, value: Node) -> Result<Option<Node>, DomainError> {
    if path.is_empty() {
        return Err(DomainError::MalformedPath {
            input: path.to_string(),
            reason: "cannot assign to the empty path".into(),
        });
    }

    match probe_for_write(root, path)? {
        Probe::Found { container, segment } => Ok(match (container, segment) {
            (Node::Map(map), Segment::Key(key)) => map.insert(key.clone(), value),
            (Node::Sequence(items), Segment::Index(index)) => {
                if items.len() <= *index {
                    items.resize(*index + 1, Node::Null);
                    items[*index] = value;
                    None
                } else {
                    Some(std::mem::replace(&mut items[*index], value))
                }
            }
            // probe only returns containers that match the terminal segment
            _ => None,
        }),
        Probe::NotFound => Err(DomainError::ProbeOnNullContainer {
            path: NodePath::root(),
        }),
    }
}

/// `true` iff the terminal position of `path` is concretely set.
///
/// May auto-vivify intermediate nodes (see module docs).
pub fn has(root: &mut Node, path: &NodePath) -> Result<bool, DomainError> {
    Ok(match probe(root, path)? {
        Probe::Found { container, segment } => lookup(container, segment).is_some(),
        Probe::NotFound => false,
    })
}

/// Read-only lookup that never creates anything; `None` on any mismatch.
pub fn peek<'a>(root: &'a Node, path: &NodePath) -> Option<&'a Node> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| lookup(node, segment))
}

fn lookup<'a>(container: &'a Node, segment: &Segment) -> Option<&'a Node> {
    match (container, segment) {
        (Node::Map(map), Segment::Key(key)) => map.get(key),
        (Node::Sequence(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}

/// Every scalar in `root` with its path, in depth-first document order.
pub fn leaves(root: &Node) -> Vec<(NodePath, &Node)> {
    fn walk<'a>(node: &'a Node, path: NodePath, out: &mut Vec<(NodePath, &'a Node)>) {
        match node {
            Node::Map(map) => {
                for (key, value) in map {
                    walk(value, path.child(key.as_str()), out);
                }
            }
            Node::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    walk(item, path.child(index), out);
                }
            }
            scalar => out.push((path, scalar)),
        }
    }

    let mut out = Vec::new();
    walk(root, NodePath::root(), &mut out);
    out
}
