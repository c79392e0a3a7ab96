//! Materialize Service - Shuntfile processing.
//!
//! This service coordinates the whole project workflow:
//! 1. Resolve the Shuntfile to a fixpoint
//! 2. Expand structured keys and validate the `project` section
//! 3. Render every view into the materialize directory
//! 4. Copy resources
//! 5. Recurse into subprojects, passing the resolved documents down

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

use crate::{
    application::{
        ApplicationError,
        directive::DirectiveRegistry,
        ports::{Filesystem, ProjectLocator, TemplateEngine},
        services::resolution_service::{ResolutionEngine, TemplateContext},
    },
    domain::{DEFAULT_DELIMITER, Node, NodePath, hmap, resolve_structured_keys_located},
    error::{ShuntError, ShuntResult},
};

pub const SHUNTFILE_NAME: &str = "Shuntfile";
pub const DEFAULT_TEMPLATE_FOLDER: &str = "shunts";

/// Binding under which ancestor documents are visible, nearest first.
pub const PARENTS_BINDING: &str = "parents";

/// A file copied verbatim into the materialize directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// The validated `project` section of a Shuntfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSpec {
    pub views: Vec<String>,
    pub resources: Vec<Resource>,
    pub subprojects: Vec<String>,
    pub shunt_paths: Vec<PathBuf>,
    pub materialize_path: PathBuf,
}

impl Default for ProjectSpec {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            resources: Vec::new(),
            subprojects: Vec::new(),
            shunt_paths: Vec::new(),
            materialize_path: PathBuf::from("."),
        }
    }
}

impl ProjectSpec {
    /// Read and validate `project` from a resolved Shuntfile tree.
    ///
    /// A missing document or `project` section is an empty project.
    pub fn from_node(root: &Node, shuntfile: &Path) -> ShuntResult<Self> {
        let invalid = |reason: String| ApplicationError::InvalidShuntfile {
            path: shuntfile.to_path_buf(),
            reason,
        };

        let project = match root {
            Node::Null => return Ok(Self::default()),
            Node::Map(_) => hmap::peek(root, &NodePath::from(["project"])),
            other => {
                return Err(invalid(format!(
                    "document must be a map, found a {}",
                    other.kind()
                ))
                .into());
            }
        };
        let Some(project) = project.filter(|p| !p.is_null()) else {
            return Ok(Self::default());
        };
        if project.as_map().is_none() {
            return Err(invalid(format!("'project' must be a map, found a {}", project.kind())).into());
        }

        let field = |name: &str| hmap::peek(project, &NodePath::from([name])).filter(|n| !n.is_null());
        let strings = |name: &str| -> ShuntResult<Vec<String>> {
            let Some(node) = field(name) else {
                return Ok(Vec::new());
            };
            let items = node.as_sequence().ok_or_else(|| {
                invalid(format!("'project/{name}' must be a list, found a {}", node.kind()))
            })?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        ShuntError::from(invalid(format!("'project/{name}/[{i}]' must be a string")))
                    })
                })
                .collect()
        };

        let views = strings("views")?;
        if let Some(bad) = views.iter().find(|v| !stays_inside(Path::new(v))) {
            return Err(invalid(format!(
                "view '{bad}' must be a relative path without '..'"
            ))
            .into());
        }

        let materialize_path = match field("materialize_path") {
            None => PathBuf::from("."),
            Some(node) => node.as_str().map(PathBuf::from).ok_or_else(|| {
                invalid("'project/materialize_path' must be a string".into())
            })?,
        };

        let resources = match field("resources") {
            None => Vec::new(),
            Some(node) => node
                .as_sequence()
                .ok_or_else(|| invalid("'project/resources' must be a list".into()))?
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    resource(item).ok_or_else(|| {
                        ShuntError::from(invalid(format!(
                            "'project/resources/[{i}]' must be a path or a map with 'source'"
                        )))
                    })
                })
                .collect::<ShuntResult<Vec<_>>>()?,
        };

        if let Some(bad) = resources.iter().find(|r| !stays_inside(&r.target)) {
            return Err(invalid(format!(
                "resource target '{}' must be a relative path without '..'",
                bad.target.display()
            ))
            .into());
        }

        Ok(Self {
            views,
            resources,
            subprojects: strings("subprojects")?,
            shunt_paths: strings("shunt_paths")?.into_iter().map(PathBuf::from).collect(),
            materialize_path,
        })
    }
}

/// `true` iff joining `path` onto a directory cannot leave it.
fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn resource(node: &Node) -> Option<Resource> {
    match node {
        Node::String(source) => Some(Resource {
            source: PathBuf::from(source),
            target: Path::new(source).file_name().map(PathBuf::from)?,
        }),
        Node::Map(map) => {
            let source = map.get("source")?.as_str()?;
            let target = match map.get("target") {
                Some(target) => PathBuf::from(target.as_str()?),
                None => Path::new(source).file_name().map(PathBuf::from)?,
            };
            Some(Resource {
                source: PathBuf::from(source),
                target,
            })
        }
        _ => None,
    }
}

/// What a materialization wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub shuntfiles: Vec<PathBuf>,
    pub views: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
}

/// Main materialization service.
pub struct MaterializeService {
    engine: ResolutionEngine,
    templates: Arc<dyn TemplateEngine>,
    filesystem: Arc<dyn Filesystem>,
    locator: Arc<dyn ProjectLocator>,
    registry: Arc<DirectiveRegistry>,
    template_folder: String,
    extra_template_paths: Vec<PathBuf>,
}

impl MaterializeService {
    /// Create a new materialize service with the given adapters.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use shunt_core::application::{MaterializeService, ResolutionEngine};
    ///
    /// let engine = ResolutionEngine::new(codec, filesystem.clone());
    /// let service = MaterializeService::new(engine, templates, filesystem, locator);
    /// let report = service.materialize(Path::new("."))?;
    /// ```
    pub fn new(
        engine: ResolutionEngine,
        templates: Arc<dyn TemplateEngine>,
        filesystem: Arc<dyn Filesystem>,
        locator: Arc<dyn ProjectLocator>,
    ) -> Self {
        Self {
            engine,
            templates,
            filesystem,
            locator,
            registry: Arc::new(DirectiveRegistry::with_builtins()),
            template_folder: DEFAULT_TEMPLATE_FOLDER.to_string(),
            extra_template_paths: Vec::new(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<DirectiveRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_template_folder(mut self, name: impl Into<String>) -> Self {
        self.template_folder = name.into();
        self
    }

    /// Template directories searched after all project ones.
    pub fn with_extra_template_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.extra_template_paths = paths;
        self
    }

    /// Materialize the project whose Shuntfile is nearest to `start`.
    #[instrument(skip_all, fields(start = %start.display()))]
    pub fn materialize(&self, start: &Path) -> ShuntResult<MaterializeReport> {
        let (_, shuntfile) = self.locator.find_root(start)?;
        let mut report = MaterializeReport::default();
        self.materialize_shuntfile(&shuntfile, &[], &[], &mut report)?;
        info!(
            shuntfiles = report.shuntfiles.len(),
            views = report.views.len(),
            resources = report.resources.len(),
            "Materialization completed successfully"
        );
        Ok(report)
    }

    /// Fully resolve one document with `parents` bound.
    pub fn resolve_document(&self, path: &Path, parents: &[Node]) -> ShuntResult<Node> {
        let state = self.engine.load(path, Arc::clone(&self.registry))?;
        let context = TemplateContext::new(Arc::clone(&self.templates))
            .bind(PARENTS_BINDING, Node::Sequence(parents.to_vec()));
        let resolution = self.engine.resolve(state, &context)?;
        let state = &resolution.state;
        Ok(resolve_structured_keys_located(
            &state.hmap,
            DEFAULT_DELIMITER,
            &|path| state.location_for(path),
        )?)
    }

    fn materialize_shuntfile(
        &self,
        shuntfile: &Path,
        parents: &[Node],
        inherited_paths: &[PathBuf],
        report: &mut MaterializeReport,
    ) -> ShuntResult<()> {
        info!(shuntfile = %shuntfile.display(), "Materializing Shuntfile");
        if report.shuntfiles.iter().any(|seen| seen == shuntfile) {
            return Err(ApplicationError::InvalidShuntfile {
                path: shuntfile.to_path_buf(),
                reason: "subprojects form a cycle".into(),
            }
            .into());
        }
        report.shuntfiles.push(shuntfile.to_path_buf());

        let root = self.resolve_document(shuntfile, parents)?;
        let spec = ProjectSpec::from_node(&root, shuntfile)?;
        let dir = shuntfile.parent().unwrap_or_else(|| Path::new("."));

        let mut search_paths: Vec<PathBuf> = spec.shunt_paths.iter().map(|p| dir.join(p)).collect();
        search_paths.extend(self.locator.template_dirs(dir, &self.template_folder)?);
        search_paths.extend(inherited_paths.iter().cloned());
        search_paths.extend(self.extra_template_paths.iter().cloned());
        let mut seen = HashSet::new();
        search_paths.retain(|p| seen.insert(p.clone()));

        let out_dir = dir.join(&spec.materialize_path);
        self.filesystem.create_dir_all(&out_dir)?;

        let bindings = view_bindings(&root, parents);
        for view in &spec.views {
            info!(view = %view, "Materialize view");
            let text = self.templates.render_view(&search_paths, view, &bindings)?;
            let target = out_dir.join(view);
            self.write(&target, &text)?;
            info!(view = %view, path = %target.display(), "Materialized view");
            report.views.push(target);
        }

        for resource in &spec.resources {
            let target = out_dir.join(&resource.target);
            if let Some(parent) = target.parent() {
                self.filesystem.create_dir_all(parent)?;
            }
            self.filesystem.copy_file(&dir.join(&resource.source), &target)?;
            info!(resource = %resource.source.display(), path = %target.display(), "Copied resource");
            report.resources.push(target);
        }

        let mut child_parents = Vec::with_capacity(parents.len() + 1);
        child_parents.push(root);
        child_parents.extend(parents.iter().cloned());
        for subproject in &spec.subprojects {
            info!(subproject = %subproject, "Processing subproject");
            let child = dir.join(subproject).join(SHUNTFILE_NAME);
            self.materialize_shuntfile(&child, &child_parents, &search_paths, report)?;
        }

        info!(shuntfile = %shuntfile.display(), "Done materializing Shuntfile");
        Ok(())
    }

    fn write(&self, path: &Path, content: &str) -> ShuntResult<()> {
        if let Some(parent) = path.parent() {
            self.filesystem.create_dir_all(parent)?;
        }
        self.filesystem.write_file(path, content)
    }
}

/// The resolved document as a map, with ancestors bound as `parents`.
fn view_bindings(root: &Node, parents: &[Node]) -> Node {
    let mut bindings = match root {
        Node::Map(map) => map.clone(),
        _ => Default::default(),
    };
    bindings.insert(PARENTS_BINDING.to_string(), Node::Sequence(parents.to_vec()));
    Node::Map(bindings)
}
