//! Directives: `@name argument` instructions embedded in scalar values.
//!
//! Directives are found by [`extract_directives`], which turns every ready
//! marker into a [`Directive`] action object without side effects. Applying
//! them is a separate step so that every directive of a pass is known before
//! the first one mutates the tree.
//!
//! A scalar that starts with `@` but still contains placeholders is not
//! ready; it is skipped and re-examined after the next render pass.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::application::{ApplicationError, parse_state::ParseState, ports::Filesystem};
use crate::domain::{
    DomainError, Location, Node, NodePath, contains_placeholder, has_free_variables, hmap,
};
use crate::error::ShuntResult;

pub const DIRECTIVE_MARKER: char = '@';

/// An action produced by a directive handler.
pub trait Directive: fmt::Debug + Send + Sync {
    /// Lower-cased directive name.
    fn name(&self) -> &str;

    /// Where the directive marker sits in the hmap.
    fn source_path(&self) -> &NodePath;

    /// Perform the directive's side effect on `state`.
    fn apply(&self, state: &mut ParseState, fs: &dyn Filesystem) -> ShuntResult<()>;
}

/// Builds a [`Directive`] from `(name, state, path, argument)`.
pub type DirectiveHandler = Arc<
    dyn Fn(&str, &ParseState, &NodePath, &str) -> ShuntResult<Box<dyn Directive>> + Send + Sync,
>;

/// Lookup table from directive name to handler.
///
/// Names are case-insensitive. One registry is built up front and shared by
/// every state of a resolution.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, DirectiveHandler>,
    default_handler: Option<DirectiveHandler>,
}

impl fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectiveRegistry")
            .field("handlers", &self.names())
            .field("default_handler", &self.default_handler.is_some())
            .finish()
    }
}

impl DirectiveRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in directives (`include`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.handlers.insert(
            IncludeDirective::NAME.to_string(),
            Arc::new(IncludeDirective::handler),
        );
        registry
    }

    /// Add a handler under `name`.
    ///
    /// # Errors
    /// `DuplicateDirective` if `name` is taken and `allow_override` is false.
    pub fn register(
        &mut self,
        name: &str,
        handler: DirectiveHandler,
        allow_override: bool,
    ) -> ShuntResult<()> {
        let name = name.to_lowercase();
        if self.handlers.contains_key(&name) {
            if !allow_override {
                return Err(ApplicationError::DuplicateDirective { name }.into());
            }
            info!(directive = %name, "overriding registered directive");
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Handler used for names with no registered handler.
    pub fn set_default_handler(&mut self, handler: DirectiveHandler) {
        self.default_handler = Some(handler);
    }

    /// Handler for `name`, falling back to the default handler.
    pub fn handler(&self, name: &str) -> Option<&DirectiveHandler> {
        self.handlers
            .get(&name.to_lowercase())
            .or(self.default_handler.as_ref())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// `true` iff `node` is a string starting with the directive marker.
pub fn is_directive(node: &Node) -> bool {
    node.as_str()
        .is_some_and(|s| s.starts_with(DIRECTIVE_MARKER))
}

/// `true` iff any scalar in `node` is a directive marker, ready or not.
pub fn has_directives(node: &Node) -> bool {
    hmap::leaves(node).into_iter().any(|(_, value)| is_directive(value))
}

/// Split `@Name rest of text` into `("name", "rest of text")`.
///
/// A directive with no argument gets the empty string.
pub fn split_directive(text: &str) -> (String, &str) {
    let body = text.strip_prefix(DIRECTIVE_MARKER).unwrap_or(text);
    let (name, argument) = body.split_once(' ').unwrap_or((body, ""));
    (name.to_lowercase(), argument)
}

/// Build action objects for every ready directive in `state`, in document
/// order.
///
/// # Errors
/// `UnknownDirective` for names with no handler, plus whatever a handler
/// rejects.
#[instrument(skip_all, fields(depth = state.depth()))]
pub fn extract_directives(state: &ParseState) -> ShuntResult<Vec<Box<dyn Directive>>> {
    let mut directives = Vec::new();
    for (path, value) in hmap::leaves(&state.hmap) {
        if !is_directive(value) || has_free_variables(value) {
            continue;
        }
        let Some(text) = value.as_str() else {
            continue;
        };
        let (name, argument) = split_directive(text);
        let handler = state.registry().handler(&name).ok_or_else(|| {
            ApplicationError::UnknownDirective {
                name: name.clone(),
                path: path.clone(),
                location: state.location_for(&path),
            }
        })?;
        debug!(directive = %name, path = %path, "extracted directive");
        directives.push(handler(&name, state, &path, argument)?);
    }
    Ok(directives)
}

/// Apply `directives` to `state` in order.
pub fn apply_directives(
    directives: &[Box<dyn Directive>],
    state: &mut ParseState,
    fs: &dyn Filesystem,
) -> ShuntResult<()> {
    for directive in directives {
        debug!(directive = directive.name(), path = %directive.source_path(), "applying directive");
        directive.apply(state, fs)?;
    }
    Ok(())
}

// ============================================================================
// Built-in: include
// ============================================================================

/// Replaces the marker with the full text of a file.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeDirective {
    path: NodePath,
    target: PathBuf,
    location: Location,
}

impl IncludeDirective {
    pub const NAME: &'static str = "include";

    pub fn new(path: NodePath, target: impl Into<PathBuf>) -> Self {
        Self {
            path,
            target: target.into(),
            location: Location::none(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Handler for `@include <path>`.
    ///
    /// The argument must be exactly one path with no placeholders. Relative
    /// paths resolve against the directory of the including document.
    pub fn handler(
        name: &str,
        state: &ParseState,
        path: &NodePath,
        argument: &str,
    ) -> ShuntResult<Box<dyn Directive>> {
        let location = state.location_for(path);
        if contains_placeholder(argument) {
            return Err(ApplicationError::FreeVariableInDirectiveArgument {
                name: name.to_string(),
                argument: argument.to_string(),
                path: path.clone(),
                location,
            }
            .into());
        }

        let mut words = argument.split_whitespace();
        let (Some(target), None) = (words.next(), words.next()) else {
            return Err(DomainError::MalformedPath {
                input: argument.to_string(),
                reason: format!("'@{name}' at '{path}' takes exactly one path ({location})"),
            }
            .into());
        };

        let target = match state.base_dir() {
            Some(base) if Path::new(target).is_relative() => base.join(target),
            _ => PathBuf::from(target),
        };

        Ok(Box::new(Self {
            path: path.clone(),
            target,
            location,
        }))
    }
}

impl Directive for IncludeDirective {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn source_path(&self) -> &NodePath {
        &self.path
    }

    fn apply(&self, state: &mut ParseState, fs: &dyn Filesystem) -> ShuntResult<()> {
        info!(
            file = %self.target.display(),
            path = %self.path,
            "including file"
        );
        let content = fs.read_to_string(&self.target).map_err(|e| {
            ApplicationError::UnresolvedInclude {
                target: self.target.clone(),
                path: self.path.clone(),
                reason: e.to_string(),
                location: self.location,
            }
        })?;
        hmap::set(&mut state.hmap, &self.path, Node::String(content))
            .map_err(|e| e.located(self.location))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::ShuntError;

    #[derive(Default)]
    struct StubFs {
        files: Mutex<HashMap<PathBuf, String>>,
    }

    impl StubFs {
        fn with(path: &str, content: &str) -> Self {
            let fs = Self::default();
            fs.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), content.to_string());
            fs
        }
    }

    impl Filesystem for StubFs {
        fn read_to_string(&self, path: &Path) -> ShuntResult<String> {
            self.files.lock().unwrap().get(path).cloned().ok_or_else(|| {
                ApplicationError::FilesystemError {
                    path: path.to_path_buf(),
                    reason: "no such file".into(),
                }
                .into()
            })
        }
        fn write_file(&self, path: &Path, content: &str) -> ShuntResult<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
            Ok(())
        }
        fn create_dir_all(&self, _path: &Path) -> ShuntResult<()> {
            Ok(())
        }
        fn copy_file(&self, from: &Path, to: &Path) -> ShuntResult<()> {
            let content = self.read_to_string(from)?;
            self.write_file(to, &content)
        }
        fn exists(&self, path: &Path) -> bool {
            self.files.lock().unwrap().contains_key(path)
        }
    }

    fn state(root: Node) -> ParseState {
        ParseState::new(root, Arc::new(DirectiveRegistry::with_builtins()))
    }

    #[test]
    fn register_rejects_duplicates_unless_overridden() {
        let mut registry = DirectiveRegistry::with_builtins();
        let handler: DirectiveHandler = Arc::new(IncludeDirective::handler);

        let err = registry
            .register("Include", Arc::clone(&handler), false)
            .unwrap_err();
        assert_eq!(
            err,
            ShuntError::Application(ApplicationError::DuplicateDirective {
                name: "include".into()
            })
        );
        assert!(registry.register("include", handler, true).is_ok());
        assert_eq!(registry.names(), vec!["include"]);
    }

    #[test]
    fn marker_detection_and_splitting() {
        assert!(is_directive(&Node::from("@include a.txt")));
        assert!(!is_directive(&Node::from("mail me @ home")));
        assert!(!is_directive(&Node::Integer(1)));

        assert_eq!(split_directive("@INCLUDE a b"), ("include".into(), "a b"));
        assert_eq!(split_directive("@bare"), ("bare".into(), ""));
    }

    #[test]
    fn directives_with_free_variables_wait() {
        let state = state([("f", Node::from("@include {{ x }}/f.txt"))].into_iter().collect());
        assert!(extract_directives(&state).unwrap().is_empty());
        assert!(has_directives(&state.hmap));
    }

    #[test]
    fn unknown_directive_cites_path() {
        let state = state(
            [("a", [("b", Node::from("@frobnicate x"))].into_iter().collect::<Node>())]
                .into_iter()
                .collect(),
        );
        match extract_directives(&state).unwrap_err() {
            ShuntError::Application(ApplicationError::UnknownDirective { name, path, .. }) => {
                assert_eq!(name, "frobnicate");
                assert_eq!(path.to_string(), "a/b");
            }
            other => panic!("expected UnknownDirective, got {other:?}"),
        }
    }

    #[test]
    fn default_handler_catches_unknown_names() {
        let mut registry = DirectiveRegistry::new();
        registry.set_default_handler(Arc::new(IncludeDirective::handler));
        let state = ParseState::new(
            [("f", Node::from("@load x.txt"))].into_iter().collect(),
            Arc::new(registry),
        );
        assert_eq!(extract_directives(&state).unwrap().len(), 1);
    }

    #[test]
    fn include_rejects_multiple_paths() {
        let state = state([("f", Node::from("@include a.txt b.txt"))].into_iter().collect());
        assert!(matches!(
            extract_directives(&state),
            Err(ShuntError::Domain(DomainError::MalformedPath { .. }))
        ));
    }

    #[test]
    fn include_argument_must_be_free_of_variables() {
        let state = state(Node::map());
        let err = IncludeDirective::handler("include", &state, &NodePath::from(["f"]), "{{ x }}")
            .unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::FreeVariableInDirectiveArgument { .. })
        ));
    }

    #[test]
    fn include_replaces_marker_with_file_contents() {
        let fs = StubFs::with("/proj/data/f.txt", "hello\n");
        let mut state = state(
            [("f", Node::from("@include data/f.txt")), ("g", Node::from("keep"))]
                .into_iter()
                .collect(),
        )
        .with_origin("/proj/Shuntfile");

        let directives = extract_directives(&state).unwrap();
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].source_path(), &NodePath::from(["f"]));

        apply_directives(&directives, &mut state, &fs).unwrap();
        let root = state.hmap.as_map().unwrap();
        assert_eq!(root["f"], Node::from("hello\n"));
        assert_eq!(root["g"], Node::from("keep"));
        assert!(!has_directives(&state.hmap));
    }

    #[test]
    fn missing_include_target_is_unresolved() {
        let fs = StubFs::default();
        let mut state = state([("f", Node::from("@include nope.txt"))].into_iter().collect());
        let directives = extract_directives(&state).unwrap();
        let err = apply_directives(&directives, &mut state, &fs).unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::UnresolvedInclude { .. })
        ));
    }
}
