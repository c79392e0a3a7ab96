//! Parse state: one hmap plus everything needed to resolve it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::{directive::DirectiveRegistry, ports::ParsedDocument};
use crate::domain::{LineInformation, Location, Node, NodePath, Provenance};

/// A document at one point of its resolution history.
///
/// A root state comes from parsing a file; every render pass derives a new
/// state whose `parent` is the state it was rendered from. The chain only
/// ever grows towards the root, so it is acyclic.
#[derive(Debug, Clone)]
pub struct ParseState {
    pub hmap: Node,
    provenance: Option<Provenance>,
    parent: Option<Box<ParseState>>,
    registry: Arc<DirectiveRegistry>,
    origin: Option<PathBuf>,
}

impl ParseState {
    pub fn new(hmap: Node, registry: Arc<DirectiveRegistry>) -> Self {
        Self {
            hmap,
            provenance: None,
            parent: None,
            registry,
            origin: None,
        }
    }

    /// A root state from a parsed document.
    pub fn from_document(document: ParsedDocument, registry: Arc<DirectiveRegistry>) -> Self {
        Self {
            hmap: document.root,
            provenance: document.provenance,
            parent: None,
            registry,
            origin: None,
        }
    }

    /// Record the file this document was read from.
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// A new state for a re-parsed document, with `self` as its parent.
    ///
    /// Registry and origin carry over.
    pub fn derive(self, document: ParsedDocument) -> Self {
        Self {
            hmap: document.root,
            provenance: document.provenance,
            registry: Arc::clone(&self.registry),
            origin: self.origin.clone(),
            parent: Some(Box::new(self)),
        }
    }

    pub fn registry(&self) -> &DirectiveRegistry {
        &self.registry
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    pub fn parent(&self) -> Option<&ParseState> {
        self.parent.as_deref()
    }

    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    /// Directory that relative paths in this document resolve against.
    pub fn base_dir(&self) -> Option<&Path> {
        self.origin.as_deref().and_then(Path::parent)
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        self.ancestors().count() - 1
    }

    /// This state followed by its parent, grandparent, and so on.
    pub fn ancestors(&self) -> impl Iterator<Item = &ParseState> {
        std::iter::successors(Some(self), |state| state.parent())
    }

    /// Source location of `path`, preferring the oldest state that knows it.
    ///
    /// Rendered intermediates only know positions in generated text; the
    /// root document's positions are the ones a user can act on.
    pub fn line_info_for(&self, path: &NodePath) -> Option<LineInformation> {
        self.ancestors()
            .filter_map(|state| state.provenance.as_ref()?.get(path).copied())
            .last()
    }

    pub fn location_for(&self, path: &NodePath) -> Location {
        self.line_info_for(path).into()
    }

    /// Drop the history, keeping only this state.
    pub fn detach(mut self) -> Self {
        self.parent = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(root: Node, entries: &[(&str, LineInformation)]) -> ParsedDocument {
        let mut provenance = Provenance::new();
        for (path, info) in entries {
            provenance.record(path.parse().unwrap(), *info);
        }
        ParsedDocument::new(root).with_provenance(provenance)
    }

    #[test]
    fn derive_links_parent_and_keeps_origin() {
        let registry = Arc::new(DirectiveRegistry::with_builtins());
        let root = ParseState::new(Node::map(), registry).with_origin("/proj/Shuntfile");
        let child = root.derive(ParsedDocument::new(Node::from("rendered")));

        assert_eq!(child.depth(), 1);
        assert_eq!(child.parent().map(|p| p.hmap.clone()), Some(Node::map()));
        assert_eq!(child.base_dir(), Some(Path::new("/proj")));
        assert_eq!(child.detach().depth(), 0);
    }

    #[test]
    fn line_info_prefers_the_oldest_state() {
        let registry = Arc::new(DirectiveRegistry::new());
        let from_source = LineInformation::at(3, 1, 20);
        let rendered = LineInformation::at(9, 1, 80);
        let root = ParseState::from_document(
            document(Node::map(), &[("a/b", from_source)]),
            Arc::clone(&registry),
        );
        let child = root.derive(document(Node::map(), &[("a/b", rendered), ("c", rendered)]));

        let path: NodePath = "a/b".parse().unwrap();
        assert_eq!(child.line_info_for(&path), Some(from_source));
        assert_eq!(child.line_info_for(&NodePath::from(["c"])), Some(rendered));
        assert_eq!(
            child.location_for(&NodePath::from(["missing"])).to_string(),
            "<no location info>"
        );
    }
}
