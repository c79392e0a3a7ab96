//! Command handlers. Each translates parsed arguments into service calls.

pub mod completions;
pub mod config;
pub mod materialize;
pub mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use shunt_adapters::{LocalFilesystem, LocalProjectLocator, TeraEngine, YamlCodec};
use shunt_core::application::{MaterializeService, ResolutionEngine};

use crate::{cli::ResolutionArgs, config::AppConfig};

/// Wire the local adapters into a [`MaterializeService`].
///
/// Extra template paths come from the configuration first, then the
/// command line. They double as `{% include %}` directories for documents.
pub(crate) fn build_service(config: &AppConfig, args: ResolutionArgs) -> MaterializeService {
    let mut extra: Vec<PathBuf> = config.templates.extra_paths.clone();
    extra.extend(args.template_paths);

    let filesystem = Arc::new(LocalFilesystem::new());
    let engine = ResolutionEngine::new(Arc::new(YamlCodec::new()), filesystem.clone())
        .with_options(config.resolution_options(args.max_passes, args.spool));
    let templates = Arc::new(TeraEngine::new().with_base_dirs(extra.clone()));

    MaterializeService::new(engine, templates, filesystem, Arc::new(LocalProjectLocator::new()))
        .with_template_folder(config.templates.folder_name.clone())
        .with_extra_template_paths(extra)
}
