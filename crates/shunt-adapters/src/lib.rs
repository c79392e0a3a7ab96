//! Infrastructure adapters for Shunt.
//!
//! This crate implements the ports defined in `shunt-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod codec;
pub mod filesystem;
pub mod locator;
pub mod renderer;

// Re-export commonly used adapters
pub use codec::YamlCodec;
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use locator::LocalProjectLocator;
pub use renderer::TeraEngine;
