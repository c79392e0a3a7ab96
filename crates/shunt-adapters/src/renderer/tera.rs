//! Tera-backed template engine.

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use shunt_core::{
    application::{
        ApplicationError,
        ports::{ESCAPE_FILTER, TemplateEngine},
    },
    domain::Node,
    error::{ShuntError, ShuntResult},
};
use tera::{Context, Tera, Value};
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use crate::codec::escape_double_quoted;

/// Renders documents and views with Tera.
///
/// Autoescaping is off: output is YAML or source code, not HTML.
#[derive(Debug, Clone, Default)]
pub struct TeraEngine {
    base_dirs: Vec<PathBuf>,
}

impl TeraEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories whose templates documents may `{% include %}`.
    pub fn with_base_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.base_dirs = dirs;
        self
    }

    fn tera_for(&self, search_paths: &[PathBuf]) -> ShuntResult<Tera> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.register_filter(ESCAPE_FILTER, escape_filter);

        let mut templates = Vec::new();
        for (name, path) in template_index(search_paths) {
            match std::fs::read_to_string(&path) {
                Ok(content) => templates.push((name, content)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable template"),
            }
        }
        debug!(count = templates.len(), "loaded templates");
        tera.add_raw_templates(templates).map_err(render_failure)?;
        Ok(tera)
    }
}

impl TemplateEngine for TeraEngine {
    fn render_str(&self, text: &str, bindings: &Node) -> ShuntResult<String> {
        let mut tera = self.tera_for(&self.base_dirs)?;
        tera.render_str(text, &context(bindings)?)
            .map_err(render_failure)
    }

    #[instrument(skip(self, bindings))]
    fn render_view(
        &self,
        search_paths: &[PathBuf],
        name: &str,
        bindings: &Node,
    ) -> ShuntResult<String> {
        let tera = self.tera_for(search_paths)?;
        if !tera.get_template_names().any(|t| t == name) {
            return Err(ApplicationError::ViewNotFound {
                name: name.to_string(),
                searched: search_paths.to_vec(),
            }
            .into());
        }
        tera.render(name, &context(bindings)?).map_err(render_failure)
    }
}

/// Every file below `dirs` keyed by its `/`-separated relative path.
///
/// When two directories hold the same name the earlier directory wins.
pub fn template_index(dirs: &[PathBuf]) -> Vec<(String, PathBuf)> {
    let mut seen = HashSet::new();
    let mut index = Vec::new();
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = template_name(dir, entry.path()) else {
                continue;
            };
            if seen.insert(name.clone()) {
                index.push((name, entry.into_path()));
            }
        }
    }
    index
}

fn template_name(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

fn escape_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let escaped = match value {
        Value::String(text) => escape_double_quoted(text),
        other => escape_double_quoted(&other.to_string()),
    };
    Ok(Value::String(escaped))
}

fn context(bindings: &Node) -> ShuntResult<Context> {
    match bindings {
        Node::Null => Ok(Context::new()),
        other => Context::from_serialize(other).map_err(render_failure),
    }
}

/// Flatten a Tera error and its causes into one message.
fn render_failure(e: tera::Error) -> ShuntError {
    let mut reason = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    ApplicationError::RenderFailure { reason }.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings<const N: usize>(entries: [(&str, Node); N]) -> Node {
        entries.into_iter().collect()
    }

    #[test]
    fn set_statements_bind_later_placeholders() {
        let text = "_: '{% set x = \"demo\" %}'\nname: '{{ x }}'\n";
        let out = TeraEngine::new().render_str(text, &Node::Null).unwrap();
        assert!(out.starts_with("_: ''\nname: 'demo'"), "{out}");
    }

    #[test]
    fn caller_bindings_are_visible() {
        let out = TeraEngine::new()
            .render_str("{{ parents | length }} {{ who }}", &bindings([
                ("parents", Node::Sequence(vec![Node::map()])),
                ("who", Node::from("<me>")),
            ]))
            .unwrap();
        assert_eq!(out, "1 <me>");
    }

    #[test]
    fn escape_filter_keeps_output_inside_double_quotes() {
        let out = TeraEngine::new()
            .render_str(
                "\"{% filter shunt_escape %}{{ v }}{% endfilter %}\"",
                &bindings([("v", Node::from("a \"b\": #c\\"))]),
            )
            .unwrap();
        assert_eq!(out, r#""a \"b\": #c\\""#);
    }

    #[test]
    fn loop_frames_scope_set_statements() {
        let text = "{% set x = 1 %}{% for _scope in [0] %}{% set x = 2 %}{{ x }}{% endfor %}{{ x }}";
        let out = TeraEngine::new().render_str(text, &Node::Null).unwrap();
        assert_eq!(out, "21");
    }

    #[test]
    fn undefined_variables_fail_to_render() {
        let err = TeraEngine::new().render_str("{{ nope }}", &Node::Null).unwrap_err();
        match err {
            ShuntError::Application(ApplicationError::RenderFailure { reason }) => {
                assert!(reason.contains("nope"), "{reason}");
            }
            other => panic!("expected RenderFailure, got {other:?}"),
        }
    }

    #[test]
    fn views_come_from_the_first_matching_directory() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(first.path().join("src")).unwrap();
        std::fs::write(first.path().join("src/main.rs"), "// {{ name }}").unwrap();
        std::fs::write(second.path().join("README.md"), "second <{{ name }}>").unwrap();
        std::fs::create_dir_all(second.path().join("src")).unwrap();
        std::fs::write(second.path().join("src/main.rs"), "shadowed").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let engine = TeraEngine::new();
        let vars = bindings([("name", Node::from("demo"))]);

        assert_eq!(engine.render_view(&dirs, "src/main.rs", &vars).unwrap(), "// demo");
        assert_eq!(engine.render_view(&dirs, "README.md", &vars).unwrap(), "second <demo>");
        assert!(matches!(
            engine.render_view(&dirs, "missing.txt", &vars),
            Err(ShuntError::Application(ApplicationError::ViewNotFound { .. }))
        ));
    }

    #[test]
    fn documents_can_include_base_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("header.txt"), "hello {{ who }}").unwrap();
        let engine = TeraEngine::new().with_base_dirs(vec![dir.path().to_path_buf()]);
        let out = engine
            .render_str(
                "{% include \"header.txt\" %}!",
                &bindings([("who", Node::from("world"))]),
            )
            .unwrap();
        assert_eq!(out, "hello world!");
    }
}
