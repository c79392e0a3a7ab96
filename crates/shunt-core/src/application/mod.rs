//! Application layer for Shunt.
//!
//! This layer contains:
//! - **Directives**: the registry, extraction, and the built-in `include`
//! - **ParseState**: a document plus its resolution history
//! - **Services**: Use case orchestration (ResolutionEngine, MaterializeService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! Directives live here rather than in the domain because applying one
//! reaches the filesystem port.

pub mod directive;
pub mod error;
pub mod parse_state;
pub mod ports;
pub mod services;

// Re-export main services
pub use services::{
    DEFAULT_TEMPLATE_FOLDER, MaterializeReport, MaterializeService, Resolution, ResolutionEngine,
    ResolutionOptions, SHUNTFILE_NAME, TemplateContext,
};

// Re-export port traits (for adapter implementation)
pub use ports::{
    DocumentCodec, ESCAPE_FILTER, Filesystem, ParsedDocument, ProjectLocator, TemplateEngine,
};

pub use directive::{Directive, DirectiveHandler, DirectiveRegistry, IncludeDirective};
pub use error::ApplicationError;
pub use parse_state::ParseState;
