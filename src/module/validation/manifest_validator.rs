//! Manifest validation
//!
//! Validates module manifests for structure before they reach the runtime.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::module::registry::manifest::ModuleManifest;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific errors
    Invalid(Vec<String>),
}

/// Manifest validator
pub struct ManifestValidator {
    /// Maximum length of a module id
    max_id_len: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self { max_id_len: 64 }
    }

    /// Validate a module manifest
    pub fn validate(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut errors = Vec::new();

        if manifest.id.is_empty() {
            errors.push("Module id cannot be empty".to_string());
        } else if !self.is_valid_id(&manifest.id) {
            errors.push(format!(
                "Invalid module id: {} (must be alphanumeric with dashes/underscores)",
                manifest.id
            ));
        }

        if manifest.name.trim().is_empty() {
            errors.push("Module name cannot be empty".to_string());
        }

        if manifest.version.trim().is_empty() {
            errors.push("Module version cannot be empty".to_string());
        }

        if let Some(entry) = &manifest.entry {
            if entry.trim().is_empty() {
                errors.push("Entry point cannot be empty when given".to_string());
            }
        }

        if let Err(dep_errors) = self.validate_dependencies(&manifest.dependencies) {
            errors.extend(dep_errors);
        }

        if errors.is_empty() {
            debug!("Manifest validation passed for module: {}", manifest.id);
            ValidationResult::Valid
        } else {
            warn!(
                "Manifest validation failed for module {}: {:?}",
                manifest.id, errors
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate module id format
    #[inline]
    pub fn is_valid_id(&self, id: &str) -> bool {
        if id.is_empty() || id.len() > self.max_id_len {
            return false;
        }

        // Must start with alphanumeric
        if !id.chars().next().map_or(false, |c| c.is_ascii_alphanumeric()) {
            return false;
        }

        id.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Validate dependency ids
    ///
    /// A module naming itself is left to the resolver, which reports it as a cycle.
    fn validate_dependencies(&self, dependencies: &[String]) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for dep in dependencies {
            if !self.is_valid_id(dep) {
                errors.push(format!("Invalid dependency id: {:?}", dep));
            }
            if !seen.insert(dep.as_str()) {
                errors.push(format!("Duplicate dependency: {}", dep));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}
