//! Module registry and discovery
//!
//! Handles module discovery, manifest parsing, and dependency resolution.

pub mod dependencies;
pub mod discovery;
pub mod manifest;

pub use dependencies::{dependents_of, DependencyPlan, ModuleDependencies, ResolutionStack};
pub use discovery::{DiscoveredModule, ModuleDiscovery};
pub use manifest::{ModuleManifest, MANIFEST_FILE_NAME};
