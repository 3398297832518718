//! Module manifest parsing
//!
//! Handles reading `manifest.json` descriptors from module directories.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::module::traits::ModuleError;
use crate::module::validation::{ManifestValidator, ValidationResult};

/// File name of the descriptor inside a module directory
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Module manifest (manifest.json structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module id (matches the directory name by convention)
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Module version
    pub version: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Ids of modules that must be loaded first, in declaration order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Capability tags this module provides
    #[serde(default)]
    pub provides: BTreeSet<String>,
    /// Free-form tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Name of the registered entry point (defaults to `id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}

impl ModuleManifest {
    /// Path of the manifest inside `module_dir`
    pub fn path_in(module_dir: &Path) -> PathBuf {
        module_dir.join(MANIFEST_FILE_NAME)
    }

    /// Returns true if `module_dir` contains a manifest file
    pub fn exists_in(module_dir: &Path) -> bool {
        Self::path_in(module_dir).is_file()
    }

    /// Load and validate the manifest of the module in `module_dir`
    ///
    /// Fails with `ManifestNotFound` when the descriptor is absent and
    /// `InvalidManifest` when it cannot be parsed or validated.
    pub async fn from_dir(module_dir: &Path) -> Result<Self, ModuleError> {
        let path = Self::path_in(module_dir);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModuleError::ManifestNotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(ModuleError::InvalidManifest(format!(
                    "Failed to read manifest file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Self::from_json_str(&contents).map_err(|e| match e {
            ModuleError::InvalidManifest(msg) => {
                ModuleError::InvalidManifest(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse and validate a manifest from JSON text
    pub fn from_json_str(contents: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest = serde_json::from_str(contents).map_err(|e| {
            ModuleError::InvalidManifest(format!("Failed to parse manifest JSON: {}", e))
        })?;

        match ManifestValidator::new().validate(&manifest) {
            ValidationResult::Valid => Ok(manifest),
            ValidationResult::Invalid(errors) => {
                Err(ModuleError::InvalidManifest(errors.join("; ")))
            }
        }
    }

    /// Name of the entry point that implements this module
    pub fn entry_name(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.id)
    }

    /// Returns true if `id` is a declared dependency
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d == id)
    }
}
