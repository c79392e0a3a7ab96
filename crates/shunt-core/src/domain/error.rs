// ============================================================================
// domain/error.rs - HMAP / PATH ERROR DOMAIN
// ============================================================================

use thiserror::Error;

use crate::domain::{path::NodePath, provenance::Location};

/// Errors raised by the hierarchical-map model itself.
///
/// All errors are:
/// - Cloneable (so they can be attached to several diagnostics)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Structural Errors
    // ========================================================================
    /// A path segment disagrees with the type of the node it is applied to,
    /// e.g. an index into a map or a key into a sequence.
    #[error("type conflict at '{path}': cannot apply {segment_kind} segment '{segment}' to a {found} ({location})")]
    TypeConflict {
        path: NodePath,
        segment: String,
        segment_kind: &'static str,
        found: &'static str,
        location: Location,
    },

    #[error("malformed path '{input}': {reason}")]
    MalformedPath { input: String, reason: String },

    /// Writing below a null root. Null intermediates are replaced on write,
    /// the root cannot be.
    #[error("cannot probe through a null container at '{path}'")]
    ProbeOnNullContainer { path: NodePath },
}

impl DomainError {
    /// Cite `location` in a type conflict that has none yet.
    pub fn located(mut self, location: Location) -> Self {
        if let Self::TypeConflict { location: slot, .. } = &mut self {
            if slot.info().is_none() {
                *slot = location;
            }
        }
        self
    }

    /// Re-root the error's path below `base`.
    pub fn under(mut self, base: &NodePath) -> Self {
        match &mut self {
            Self::TypeConflict { path, .. } | Self::ProbeOnNullContainer { path } => {
                *path = base.join(path);
            }
            Self::MalformedPath { .. } => {}
        }
        self
    }

    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::TypeConflict { path, found, .. } => vec![
                format!("The node at or above '{}' is a {}", path, found),
                "Use `[N]` segments only for sequences and plain keys only for maps".into(),
            ],
            Self::MalformedPath { input, .. } => vec![
                format!("Check the key '{}'", input),
                "Structured keys must not start, end, or repeat the '/' delimiter".into(),
            ],
            Self::ProbeOnNullContainer { path } => vec![
                format!("The value at '{}' is null", path),
                "Start from a map or sequence document".into(),
            ],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TypeConflict { .. } | Self::MalformedPath { .. } => ErrorCategory::Validation,
            Self::ProbeOnNullContainer { .. } => ErrorCategory::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Internal,
}
