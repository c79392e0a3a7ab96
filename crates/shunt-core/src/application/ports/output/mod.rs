//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the application needs from external systems.
//! The `shunt-adapters` crate provides implementations.

use std::path::{Path, PathBuf};

use crate::domain::{Node, Provenance};
use crate::error::ShuntResult;

/// A parsed document: its tree plus where each node came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub root: Node,
    pub provenance: Option<Provenance>,
}

impl ParsedDocument {
    pub fn new(root: Node) -> Self {
        Self {
            root,
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }
}

/// Port for the structured document format.
///
/// Implemented by:
/// - `shunt_adapters::codec::YamlCodec`
///
/// `parse` failures are reported as `MalformedDocument`; the resolution
/// engine re-labels them `ReparseFailure` for rendered text.
pub trait DocumentCodec: Send + Sync {
    /// Parse `text` into a tree, recording provenance when available.
    fn parse(&self, text: &str) -> ShuntResult<ParsedDocument>;

    /// Serialize `node` back to text that `parse` accepts.
    fn dump(&self, node: &Node) -> ShuntResult<String>;

    /// Serialize `node` as a template whose rendering `parse` accepts.
    ///
    /// Whatever text the markup in a string produces must stay inside that
    /// string's scalar. Codecs that quote such strings pass every output
    /// through [`ESCAPE_FILTER`]. The default is [`Self::dump`].
    fn dump_for_render(&self, node: &Node) -> ShuntResult<String> {
        self.dump(node)
    }
}

/// Template filter every [`TemplateEngine`] provides: escapes its input for
/// the inside of a double-quoted string, using JSON escape sequences.
pub const ESCAPE_FILTER: &str = "shunt_escape";

/// Port for template rendering.
///
/// Every render must have [`ESCAPE_FILTER`] available.
///
/// Implemented by:
/// - `shunt_adapters::renderer::TeraEngine`
pub trait TemplateEngine: Send + Sync {
    /// Substitute placeholders in `text` using `bindings` (a map node).
    fn render_str(&self, text: &str, bindings: &Node) -> ShuntResult<String>;

    /// Render the named view found under `search_paths`.
    ///
    /// The first search path that holds `name` wins. Fails with
    /// `ViewNotFound` when none does.
    fn render_view(
        &self,
        search_paths: &[PathBuf],
        name: &str,
        bindings: &Node,
    ) -> ShuntResult<String>;
}

/// Port for filesystem operations.
///
/// Implemented by:
/// - `shunt_adapters::filesystem::LocalFilesystem` (production)
/// - `shunt_adapters::filesystem::MemoryFilesystem` (testing)
pub trait Filesystem: Send + Sync {
    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> ShuntResult<String>;

    /// Write content to a file, creating or truncating it.
    fn write_file(&self, path: &Path, content: &str) -> ShuntResult<()>;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> ShuntResult<()>;

    /// Copy a file byte for byte.
    fn copy_file(&self, from: &Path, to: &Path) -> ShuntResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Port for project discovery.
///
/// Implemented by:
/// - `shunt_adapters::locator::LocalProjectLocator`
pub trait ProjectLocator: Send + Sync {
    /// Nearest ancestor of `start` (inclusive) containing a Shuntfile.
    ///
    /// Returns the project root and the Shuntfile path, or
    /// `ShuntfileNotFound`.
    fn find_root(&self, start: &Path) -> ShuntResult<(PathBuf, PathBuf)>;

    /// Every directory named `folder_name` below `root`, in a stable order.
    fn template_dirs(&self, root: &Path, folder_name: &str) -> ShuntResult<Vec<PathBuf>>;
}
