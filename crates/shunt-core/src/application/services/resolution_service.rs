//! Resolution Service - the fixpoint loop.
//!
//! Each iteration:
//! 1. If placeholders remain, lift `vars` blocks into scoped template `set`
//!    statements, dump the tree, render it, and re-parse the output as a
//!    new [`ParseState`] derived from the old one.
//! 2. Extract every ready directive, then apply them in document order.
//! 3. Stop once no placeholders and no directive markers remain.
//!
//! The loop gives up with `NonTerminatingResolution` when a render pass
//! changes nothing or the pass cap is reached.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::application::{
    ApplicationError,
    directive::{DirectiveRegistry, apply_directives, extract_directives, has_directives},
    parse_state::ParseState,
    ports::{DocumentCodec, Filesystem, TemplateEngine},
};
use crate::domain::{
    Node, NodeMap, has_free_variables,
    variables::{Piece, discard_handlebars, split_placeholders},
};
use crate::error::{Context, ShuntError, ShuntResult};

/// Key of the map holding a scope's variable bindings.
pub const VARS_KEY: &str = "vars";

/// Key the lifted `set` statements are stored under; removed after render.
pub const RESERVED_KEY: &str = "_";

/// Key closing a lifted scope; always the last entry of its map.
pub const SCOPE_END_KEY: &str = "__";

/// A single-pass loop gives each scope its own frame, so its `set`
/// statements are invisible once the loop ends.
const SCOPE_OPEN: &str = "{% for _scope in [0] %}";
const SCOPE_CLOSE: &str = "{% endfor %}";

pub const DEFAULT_MAX_PASSES: usize = 32;

/// Tuning for [`ResolutionEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOptions {
    /// Upper bound on loop iterations.
    pub max_passes: usize,
    /// Keep each pass's pre-render and rendered text in named temp files for
    /// the duration of the pass.
    pub spool_intermediates: bool,
    /// Where spooled files go; the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            spool_intermediates: false,
            spool_dir: None,
        }
    }
}

/// A template engine plus the variables bound for every render.
#[derive(Clone)]
pub struct TemplateContext {
    engine: Arc<dyn TemplateEngine>,
    bindings: Node,
}

impl TemplateContext {
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            engine,
            bindings: Node::map(),
        }
    }

    /// Replace all bindings. `bindings` should be a map.
    pub fn with_bindings(mut self, bindings: Node) -> Self {
        self.bindings = bindings;
        self
    }

    /// Bind a single variable.
    pub fn bind(mut self, name: impl Into<String>, value: Node) -> Self {
        if let Node::Map(map) = &mut self.bindings {
            map.insert(name.into(), value);
        }
        self
    }

    pub fn engine(&self) -> &dyn TemplateEngine {
        self.engine.as_ref()
    }

    pub fn bindings(&self) -> &Node {
        &self.bindings
    }

    pub fn render(&self, text: &str) -> ShuntResult<String> {
        self.engine.render_str(text, &self.bindings)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Final state; its parent chain holds every intermediate.
    pub state: ParseState,
    /// Number of render passes performed.
    pub passes: usize,
}

impl Resolution {
    pub fn root(&self) -> &Node {
        &self.state.hmap
    }

    pub fn into_root(self) -> Node {
        self.state.hmap
    }
}

/// Drives documents to a fixpoint.
pub struct ResolutionEngine {
    codec: Arc<dyn DocumentCodec>,
    filesystem: Arc<dyn Filesystem>,
    options: ResolutionOptions,
}

impl ResolutionEngine {
    pub fn new(codec: Arc<dyn DocumentCodec>, filesystem: Arc<dyn Filesystem>) -> Self {
        Self {
            codec,
            filesystem,
            options: ResolutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ResolutionOptions {
        &self.options
    }

    pub fn codec(&self) -> &dyn DocumentCodec {
        self.codec.as_ref()
    }

    /// Read and parse a document into a root state.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(&self, path: &Path, registry: Arc<DirectiveRegistry>) -> ShuntResult<ParseState> {
        let text = self.filesystem.read_to_string(path)?;
        let document = self.codec.parse(&text)?;
        Ok(ParseState::from_document(document, registry).with_origin(path))
    }

    /// Run the fixpoint loop on `state`.
    ///
    /// # Errors
    /// Any render, re-parse, or directive error aborts the whole resolution.
    #[instrument(skip_all, fields(max_passes = self.options.max_passes))]
    pub fn resolve(&self, state: ParseState, context: &TemplateContext) -> ShuntResult<Resolution> {
        let mut state = state;
        let mut passes = 0;

        for iteration in 1..=self.options.max_passes {
            if has_free_variables(&state.hmap) {
                passes += 1;
                state = self.render_pass(state, context, passes)?;
                let unchanged = state
                    .parent()
                    .is_some_and(|previous| previous.hmap == state.hmap);
                if unchanged {
                    return Err(ApplicationError::NonTerminatingResolution {
                        passes,
                        reason: "a render pass left the document unchanged".into(),
                    }
                    .into());
                }
            }

            let directives = extract_directives(&state)?;
            if !directives.is_empty() {
                info!(count = directives.len(), iteration, "applying directives");
                apply_directives(&directives, &mut state, self.filesystem.as_ref())?;
            }

            if !has_free_variables(&state.hmap) && !has_directives(&state.hmap) {
                info!(passes, iterations = iteration, "resolution complete");
                return Ok(Resolution { state, passes });
            }
        }

        Err(ApplicationError::NonTerminatingResolution {
            passes,
            reason: format!(
                "placeholders or directives remain after {} iterations",
                self.options.max_passes
            ),
        }
        .into())
    }

    /// Render `state` once and re-parse the output.
    fn render_pass(
        &self,
        state: ParseState,
        context: &TemplateContext,
        pass: usize,
    ) -> ShuntResult<ParseState> {
        let lifted = lift_vars(&state.hmap);
        let text = self.codec.dump_for_render(&lifted)?;
        let pre = self.spool("shunt-pre-resolve_", &text)?;
        debug!(pass, bytes = text.len(), "rendering document");

        let rendered = context.render(&text)?;
        let post = self.spool("shunt-rendered_", &rendered)?;

        let mut document = self.codec.parse(&rendered).map_err(|e| {
            let mut reason = format!("pass {pass}: {e}");
            if let Some(file) = post.as_ref().or(pre.as_ref()) {
                reason.push_str(&format!(" (rendering at '{}')", file.path().display()));
            }
            ShuntError::from(ApplicationError::ReparseFailure { reason })
        })?;
        strip_reserved(&mut document.root);

        info!(pass, "render pass complete");
        Ok(state.derive(document))
    }

    /// Keep `text` in a named temp file if spooling is on.
    ///
    /// The file is removed when the returned handle drops.
    fn spool(&self, prefix: &str, text: &str) -> ShuntResult<Option<NamedTempFile>> {
        if !self.options.spool_intermediates {
            return Ok(None);
        }
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(".yaml");
        let mut file = match &self.options.spool_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("creating intermediate document")?;
        file.write_all(text.as_bytes())
            .context("writing intermediate document")?;
        debug!(path = %file.path().display(), "spooled intermediate document");
        Ok(Some(file))
    }
}

// ============================================================================
// vars lifting
// ============================================================================

/// Copy `node`, turning every map with a `vars` map into a template scope.
///
/// The scope opens in a leading reserved entry holding one `set` statement
/// per binding and closes in a trailing one, so bindings reach the map's
/// own values and nested maps but nothing after it. The `vars` block itself
/// is kept. Existing reserved keys are dropped.
pub fn lift_vars(node: &Node) -> Node {
    match node {
        Node::Map(map) => {
            let mut out = NodeMap::with_capacity(map.len() + 2);
            let statements = match map.get(VARS_KEY) {
                Some(Node::Map(vars)) => binding_statements(vars),
                _ => String::new(),
            };
            let scoped = !statements.is_empty();
            if scoped {
                out.insert(
                    RESERVED_KEY.to_string(),
                    Node::String(format!("{SCOPE_OPEN}{statements}")),
                );
            }
            for (key, value) in map {
                if is_reserved(key) {
                    continue;
                }
                let value = if key == VARS_KEY {
                    value.clone()
                } else {
                    lift_vars(value)
                };
                out.insert(key.clone(), value);
            }
            if scoped {
                out.insert(SCOPE_END_KEY.to_string(), Node::from(SCOPE_CLOSE));
            }
            Node::Map(out)
        }
        Node::Sequence(items) => Node::Sequence(items.iter().map(lift_vars).collect()),
        scalar => scalar.clone(),
    }
}

fn is_reserved(key: &str) -> bool {
    key == RESERVED_KEY || key == SCOPE_END_KEY
}

/// Remove every reserved key from `node`.
pub fn strip_reserved(node: &mut Node) {
    match node {
        Node::Map(map) => {
            map.retain(|key, _| !is_reserved(key));
            map.values_mut().for_each(strip_reserved);
        }
        Node::Sequence(items) => items.iter_mut().for_each(strip_reserved),
        _ => {}
    }
}

fn binding_statements(vars: &NodeMap) -> String {
    let mut out = String::new();
    for (raw_name, value) in vars {
        let name = discard_handlebars(raw_name);
        let name = name.trim();
        if !is_identifier(name) {
            warn!(name = %raw_name, "skipping binding with invalid name");
            continue;
        }
        let Some(expression) = binding_expression(value) else {
            warn!(name, kind = value.kind(), "skipping binding that is not a usable scalar");
            continue;
        };
        out.push_str(&format!("{{% set {name} = {expression} %}}"));
    }
    out
}

fn binding_expression(value: &Node) -> Option<String> {
    match value {
        Node::String(s) => string_expression(s),
        Node::Bool(b) => Some(b.to_string()),
        Node::Integer(i) => Some(i.to_string()),
        Node::Float(x) if x.is_finite() => Some(format!("{x:?}")),
        _ => None,
    }
}

/// `a {{ b }} c` becomes `"a " ~ b ~ " c"`.
fn string_expression(text: &str) -> Option<String> {
    let pieces = split_placeholders(text);
    if pieces.is_empty() {
        return Some("\"\"".into());
    }
    pieces
        .into_iter()
        .map(|piece| match piece {
            Piece::Literal(literal) => quote(literal),
            Piece::Expression(expr) if expr.is_empty() => None,
            Piece::Expression(expr) => Some(expr.to_string()),
        })
        .collect::<Option<Vec<_>>>()
        .map(|parts| parts.join(" ~ "))
}

/// Quote a literal with the first delimiter it does not contain.
fn quote(literal: &str) -> Option<String> {
    ['"', '`', '\'']
        .into_iter()
        .find(|q| !literal.contains(*q))
        .map(|q| format!("{q}{literal}{q}"))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use mockall::{mock, predicate::*};

    use super::*;
    use crate::application::ports::ParsedDocument;

    mock! {
        pub Engine {}
        impl TemplateEngine for Engine {
            fn render_str(&self, text: &str, bindings: &Node) -> ShuntResult<String>;
            fn render_view(&self, search_paths: &[PathBuf], name: &str, bindings: &Node) -> ShuntResult<String>;
        }
    }

    /// Codec whose text form is the JSON encoding of the tree, and which
    /// parses back a fixed table of known texts.
    struct TableCodec {
        parses: HashMap<String, Node>,
    }

    impl DocumentCodec for TableCodec {
        fn parse(&self, text: &str) -> ShuntResult<ParsedDocument> {
            self.parses
                .get(text)
                .cloned()
                .map(ParsedDocument::new)
                .ok_or_else(|| {
                    ApplicationError::MalformedDocument {
                        reason: format!("unexpected text {text:?}"),
                        location: Default::default(),
                    }
                    .into()
                })
        }

        fn dump(&self, node: &Node) -> ShuntResult<String> {
            serde_json::to_string(node).context("dumping")
        }
    }

    #[derive(Default)]
    struct NoFs {
        reads: Mutex<Vec<PathBuf>>,
    }

    impl Filesystem for NoFs {
        fn read_to_string(&self, path: &Path) -> ShuntResult<String> {
            self.reads.lock().unwrap().push(path.to_path_buf());
            Ok("included".into())
        }
        fn write_file(&self, _: &Path, _: &str) -> ShuntResult<()> {
            Ok(())
        }
        fn create_dir_all(&self, _: &Path) -> ShuntResult<()> {
            Ok(())
        }
        fn copy_file(&self, _: &Path, _: &Path) -> ShuntResult<()> {
            Ok(())
        }
        fn exists(&self, _: &Path) -> bool {
            true
        }
    }

    fn map<const N: usize>(entries: [(&str, Node); N]) -> Node {
        entries.into_iter().collect()
    }

    fn state(root: Node) -> ParseState {
        ParseState::new(root, Arc::new(DirectiveRegistry::with_builtins()))
    }

    #[test]
    fn lifting_puts_set_statements_first() {
        let doc = map([
            ("name", Node::from("{{ project }}")),
            ("vars", map([("project", Node::from("demo")), ("count", Node::Integer(3))])),
        ]);
        let lifted = lift_vars(&doc);
        let keys: Vec<_> = lifted.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["_", "name", "vars", "__"]);
        assert_eq!(
            lifted.as_map().unwrap()["_"],
            Node::from(r#"{% for _scope in [0] %}{% set project = "demo" %}{% set count = 3 %}"#)
        );
        assert_eq!(lifted.as_map().unwrap()["__"], Node::from("{% endfor %}"));
    }

    #[test]
    fn lifting_compiles_placeholders_into_expressions() {
        let vars = [("{{ path }}", Node::from("{{ base }}/src/{{ name | lower }}.rs"))]
            .into_iter()
            .collect::<Node>();
        let Node::Map(vars) = vars else { unreachable!() };
        assert_eq!(
            binding_statements(&vars),
            r#"{% set path = base ~ "/src/" ~ name | lower ~ ".rs" %}"#
        );
    }

    #[test]
    fn lifting_skips_unusable_bindings() {
        let vars = map([
            ("ok", Node::Bool(true)),
            ("not an identifier", Node::from("x")),
            ("nested", map([("a", Node::Integer(1))])),
            ("nothing", Node::Null),
        ]);
        let Node::Map(vars) = vars else { unreachable!() };
        assert_eq!(binding_statements(&vars), "{% set ok = true %}");
    }

    #[test]
    fn lifting_is_per_scope_and_strip_undoes_it() {
        let doc = map([(
            "child",
            map([("vars", map([("x", Node::from("it's"))])), ("v", Node::from("{{ x }}"))]),
        )]);
        let mut lifted = lift_vars(&doc);
        let child = lifted.as_map().unwrap()["child"].as_map().unwrap().clone();
        assert_eq!(
            child["_"],
            Node::from(r#"{% for _scope in [0] %}{% set x = "it's" %}"#)
        );
        assert_eq!(child.keys().last().map(String::as_str), Some("__"));
        assert!(!lifted.as_map().unwrap().contains_key("_"));

        strip_reserved(&mut lifted);
        assert_eq!(lifted, doc);
    }

    #[test]
    fn map_without_usable_bindings_is_not_scoped() {
        let doc = map([
            ("vars", map([("nothing", Node::Null)])),
            ("_", Node::from("user")),
            ("__", Node::from("user")),
            ("a", Node::from("{{ x }}")),
        ]);
        let lifted = lift_vars(&doc);
        let keys: Vec<_> = lifted.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["vars", "a"]);
    }

    #[test]
    fn quoting_picks_a_free_delimiter() {
        assert_eq!(quote("plain").as_deref(), Some("\"plain\""));
        assert_eq!(quote("say \"hi\"").as_deref(), Some("`say \"hi\"`"));
        assert_eq!(quote("\"`'"), None);
    }

    #[test]
    fn document_without_placeholders_needs_no_render() {
        let engine = MockEngine::new();
        let codec = TableCodec {
            parses: HashMap::new(),
        };
        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(NoFs::default()));
        let context = TemplateContext::new(Arc::new(engine));

        let doc = map([("a", Node::from("plain"))]);
        let resolution = resolver.resolve(state(doc.clone()), &context).unwrap();
        assert_eq!(resolution.passes, 0);
        assert_eq!(resolution.into_root(), doc);
    }

    #[test]
    fn single_binding_resolves_in_one_pass() {
        let doc = map([
            ("vars", map([("x", Node::from("demo"))])),
            ("name", Node::from("{{ x }}")),
        ]);
        let dumped = serde_json::to_string(&lift_vars(&doc)).unwrap();
        let rendered = r#"{"_":"","vars":{"x":"demo"},"name":"demo"}"#.to_string();
        let result = map([
            ("_", Node::from("")),
            ("vars", map([("x", Node::from("demo"))])),
            ("name", Node::from("demo")),
        ]);

        let mut engine = MockEngine::new();
        let output = rendered.clone();
        engine
            .expect_render_str()
            .with(eq(dumped), always())
            .times(1)
            .returning(move |_, _| Ok(output.clone()));
        let codec = TableCodec {
            parses: HashMap::from([(rendered, result)]),
        };

        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(NoFs::default()));
        let context = TemplateContext::new(Arc::new(engine));
        let resolution = resolver.resolve(state(doc), &context).unwrap();

        assert_eq!(resolution.passes, 1);
        assert_eq!(resolution.state.depth(), 1);
        let root = resolution.root().as_map().unwrap();
        assert_eq!(root["name"], Node::from("demo"));
        assert!(!root.contains_key("_"));
        assert!(!has_free_variables(resolution.root()));
    }

    #[test]
    fn unchanged_render_is_non_terminating() {
        let doc = map([("name", Node::from("{{ x }}"))]);
        let mut engine = MockEngine::new();
        engine
            .expect_render_str()
            .returning(|text, _| Ok(text.to_string()));
        let codec = TableCodec {
            parses: HashMap::from([(serde_json::to_string(&doc).unwrap(), doc.clone())]),
        };

        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(NoFs::default()));
        let context = TemplateContext::new(Arc::new(engine));
        let err = resolver.resolve(state(doc), &context).unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::NonTerminatingResolution { passes: 1, .. })
        ));
    }

    #[test]
    fn regenerated_directives_hit_the_pass_cap() {
        struct LoopFs;
        impl Filesystem for LoopFs {
            fn read_to_string(&self, _: &Path) -> ShuntResult<String> {
                Ok("@include again.txt".into())
            }
            fn write_file(&self, _: &Path, _: &str) -> ShuntResult<()> {
                Ok(())
            }
            fn create_dir_all(&self, _: &Path) -> ShuntResult<()> {
                Ok(())
            }
            fn copy_file(&self, _: &Path, _: &Path) -> ShuntResult<()> {
                Ok(())
            }
            fn exists(&self, _: &Path) -> bool {
                true
            }
        }

        let codec = TableCodec {
            parses: HashMap::new(),
        };
        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(LoopFs)).with_options(
            ResolutionOptions {
                max_passes: 4,
                ..Default::default()
            },
        );
        let context = TemplateContext::new(Arc::new(MockEngine::new()));
        let err = resolver
            .resolve(state(map([("f", Node::from("@include a.txt"))])), &context)
            .unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::NonTerminatingResolution { passes: 0, .. })
        ));
    }

    #[test]
    fn directives_apply_without_render() {
        let fs = Arc::new(NoFs::default());
        let codec = TableCodec {
            parses: HashMap::new(),
        };
        let resolver = ResolutionEngine::new(Arc::new(codec), fs.clone());
        let context = TemplateContext::new(Arc::new(MockEngine::new()));

        let resolution = resolver
            .resolve(state(map([("f", Node::from("@include a.txt"))])), &context)
            .unwrap();
        assert_eq!(resolution.root(), &map([("f", Node::from("included"))]));
        assert_eq!(*fs.reads.lock().unwrap(), vec![PathBuf::from("a.txt")]);
    }

    #[test]
    fn render_errors_abort_resolution() {
        let mut engine = MockEngine::new();
        engine.expect_render_str().returning(|_, _| {
            Err(ApplicationError::RenderFailure {
                reason: "boom".into(),
            }
            .into())
        });
        let codec = TableCodec {
            parses: HashMap::new(),
        };
        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(NoFs::default()));
        let context = TemplateContext::new(Arc::new(engine));
        let err = resolver
            .resolve(state(map([("a", Node::from("{{ y }}"))])), &context)
            .unwrap_err();
        assert!(matches!(
            err,
            ShuntError::Application(ApplicationError::RenderFailure { .. })
        ));
    }

    #[test]
    fn unparsable_render_is_a_reparse_failure_and_spool_is_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = MockEngine::new();
        engine
            .expect_render_str()
            .returning(|_, _| Ok("not in the table".into()));
        let codec = TableCodec {
            parses: HashMap::new(),
        };
        let resolver = ResolutionEngine::new(Arc::new(codec), Arc::new(NoFs::default()))
            .with_options(ResolutionOptions {
                spool_intermediates: true,
                spool_dir: Some(dir.path().to_path_buf()),
                ..Default::default()
            });
        let context = TemplateContext::new(Arc::new(engine));
        let err = resolver
            .resolve(state(map([("a", Node::from("{{ y }}"))])), &context)
            .unwrap_err();

        match err {
            ShuntError::Application(ApplicationError::ReparseFailure { reason }) => {
                assert!(reason.contains("shunt-rendered_"), "{reason}");
            }
            other => panic!("expected ReparseFailure, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
