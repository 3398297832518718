//! Module validation framework
//!
//! Provides structural validation of module manifests.

pub mod manifest_validator;

pub use manifest_validator::{ManifestValidator, ValidationResult};
