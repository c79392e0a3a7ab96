//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "resolve a document" or "materialize a project".

pub mod materialize_service;
pub mod resolution_service;

pub use materialize_service::{
    DEFAULT_TEMPLATE_FOLDER, MaterializeReport, MaterializeService, ProjectSpec, Resource,
    SHUNTFILE_NAME,
};
pub use resolution_service::{
    DEFAULT_MAX_PASSES, Resolution, ResolutionEngine, ResolutionOptions, TemplateContext,
};
