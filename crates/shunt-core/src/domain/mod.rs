// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Shunt.
//!
//! Pure data model for hierarchical maps. No I/O and no templating: those
//! concerns are reached through ports in the application layer.
//!
//! - **path**: [`NodePath`] and its [`Segment`]s, structured-key parsing
//! - **node**: the [`Node`] tree
//! - **hmap**: probe / get / set / has with auto-vivification
//! - **structured_key**: expansion of `a/b/c` keys into nesting
//! - **variables**: free-variable (placeholder) detection
//! - **provenance**: source locations for diagnostics
pub mod error;
pub mod hmap;
pub mod node;
pub mod path;
pub mod provenance;
pub mod structured_key;
pub mod variables;

pub use error::{DomainError, ErrorCategory};
pub use node::{Node, NodeMap};
pub use path::{DEFAULT_DELIMITER, NodePath, Segment};
pub use provenance::{LineInformation, Location, Provenance};
pub use structured_key::{resolve_structured_keys, resolve_structured_keys_located};
pub use variables::{Markup, contains_markup, contains_placeholder, has_free_variables, split_markup};
