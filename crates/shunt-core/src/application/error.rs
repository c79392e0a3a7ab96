//! Application layer errors.
//!
//! These errors represent failures while orchestrating a resolution or a
//! materialization: directives, template rendering, re-parsing, and I/O
//! through the ports. Errors of the data model itself are `DomainError`.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{NodePath, provenance::Location};
use crate::error::ErrorCategory;

/// Errors that occur during application orchestration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    // ========================================================================
    // Directive Errors
    // ========================================================================
    #[error("directive '@{name}' is already registered")]
    DuplicateDirective { name: String },

    #[error("unknown directive '@{name}' at '{path}' ({location})")]
    UnknownDirective {
        name: String,
        path: NodePath,
        location: Location,
    },

    #[error("argument of '@{name}' at '{path}' still has free variables: '{argument}' ({location})")]
    FreeVariableInDirectiveArgument {
        name: String,
        argument: String,
        path: NodePath,
        location: Location,
    },

    #[error("cannot include '{target}' at '{path}': {reason} ({location})")]
    UnresolvedInclude {
        target: PathBuf,
        path: NodePath,
        reason: String,
        location: Location,
    },

    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The fixpoint loop hit its pass cap or stopped making progress.
    #[error("resolution did not terminate after {passes} pass(es): {reason}")]
    NonTerminatingResolution { passes: usize, reason: String },

    #[error("template rendering failed: {reason}")]
    RenderFailure { reason: String },

    #[error("rendered document is not valid: {reason}")]
    ReparseFailure { reason: String },

    #[error("malformed document: {reason} ({location})")]
    MalformedDocument { reason: String, location: Location },

    // ========================================================================
    // Project Errors
    // ========================================================================
    #[error("filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    #[error("no Shuntfile found in {start} or any parent directory")]
    ShuntfileNotFound { start: PathBuf },

    #[error("invalid Shuntfile {path}: {reason}")]
    InvalidShuntfile { path: PathBuf, reason: String },

    #[error("view '{name}' not found in any template directory")]
    ViewNotFound { name: String, searched: Vec<PathBuf> },
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::DuplicateDirective { name } => vec![
                format!("A handler for '@{}' already exists", name),
                "Register with allow_override to replace it".into(),
            ],
            Self::UnknownDirective { name, .. } => vec![
                format!("'@{}' is not a registered directive", name),
                "Built-in directives: @include".into(),
                "Quote literal values that start with '@' differently, e.g. ' @value'".into(),
            ],
            Self::FreeVariableInDirectiveArgument { argument, .. } => vec![
                format!("'{}' must be fully resolved before the directive runs", argument),
                "Check that every variable it uses is bound in a `vars` block".into(),
            ],
            Self::UnresolvedInclude { target, .. } => vec![
                format!("Check that {} exists and is readable", target.display()),
                "Include paths are relative to the including document".into(),
            ],
            Self::NonTerminatingResolution { .. } => vec![
                "An include or template keeps producing new placeholders".into(),
                "Raise resolution.max_passes if the document is just deep".into(),
            ],
            Self::RenderFailure { .. } => vec![
                "Check the template syntax near the placeholders".into(),
                "Every variable used must be bound in a `vars` block or by the caller".into(),
            ],
            Self::ReparseFailure { .. } => vec![
                "A rendered value produced invalid YAML".into(),
                "Quote values whose rendered text contains ':' or '#'".into(),
            ],
            Self::MalformedDocument { .. } => vec!["Fix the YAML syntax error".into()],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that the path exists and you have permissions".into(),
            ],
            Self::ShuntfileNotFound { .. } => vec![
                "Run the command inside a project that has a Shuntfile".into(),
                "Or pass the project directory explicitly".into(),
            ],
            Self::InvalidShuntfile { reason, .. } => vec![format!("Fix the Shuntfile: {}", reason)],
            Self::ViewNotFound { searched, .. } => {
                let mut out = vec!["Searched template directories:".to_string()];
                out.extend(searched.iter().map(|p| format!("  {}", p.display())));
                out
            }
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::DuplicateDirective { .. } => ErrorCategory::Internal,
            Self::NonTerminatingResolution { .. }
            | Self::UnknownDirective { .. }
            | Self::FreeVariableInDirectiveArgument { .. }
            | Self::RenderFailure { .. }
            | Self::ReparseFailure { .. }
            | Self::MalformedDocument { .. }
            | Self::InvalidShuntfile { .. } => ErrorCategory::Validation,
            Self::UnresolvedInclude { .. }
            | Self::ShuntfileNotFound { .. }
            | Self::ViewNotFound { .. } => ErrorCategory::NotFound,
            Self::FilesystemError { .. } => ErrorCategory::Internal,
        }
    }
}
