//! Shunt Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for Shunt, which
//! materializes project scaffolding from declarative YAML documents.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            shunt-cli (CLI)              │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │ (ResolutionEngine, MaterializeService)  │
//! │   Directives, ParseState, fixpoint loop │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Codec, TemplateEngine, Filesystem,     │
//! │  ProjectLocator)                        │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     shunt-adapters (Infrastructure)     │
//! │ (YamlCodec, TeraEngine, LocalFilesystem)│
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        Domain Layer (Pure Logic)        │
//! │  (Node, NodePath, hmap, structured keys,│
//! │   free variables, provenance)           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shunt_core::prelude::*;
//!
//! let engine = ResolutionEngine::new(codec, filesystem);
//! let state = engine.load(Path::new("Shuntfile"), Arc::new(DirectiveRegistry::with_builtins()))?;
//! let resolution = engine.resolve(state, &TemplateContext::new(templates))?;
//! println!("{} render pass(es)", resolution.passes);
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        DirectiveRegistry, MaterializeReport, MaterializeService, ParseState, Resolution,
        ResolutionEngine, ResolutionOptions, TemplateContext,
        ports::{DocumentCodec, Filesystem, ParsedDocument, ProjectLocator, TemplateEngine},
    };
    pub use crate::domain::{LineInformation, Node, NodeMap, NodePath, Provenance, Segment};
    pub use crate::error::{ShuntError, ShuntResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
