//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `shunt-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `DocumentCodec`: text <-> [`Node`](crate::domain::Node) with provenance
//!   - `TemplateEngine`: placeholder substitution and view rendering
//!   - `Filesystem`: File operations
//!   - `ProjectLocator`: Shuntfile and template-directory discovery
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{
    DocumentCodec, ESCAPE_FILTER, Filesystem, ParsedDocument, ProjectLocator, TemplateEngine,
};
