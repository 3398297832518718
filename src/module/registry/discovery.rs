//! Module discovery
//!
//! Scans a modules directory and discovers the subdirectories that hold a module.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::ModuleError;

/// Discovered module information
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Module id (directory name)
    pub id: String,
    /// Module directory path
    pub directory: PathBuf,
    /// Module manifest
    pub manifest: ModuleManifest,
}

/// Module discovery scanner
pub struct ModuleDiscovery {
    /// Base directory to scan for modules
    modules_dir: PathBuf,
}

impl ModuleDiscovery {
    /// Create a new module discovery scanner
    pub fn new<P: AsRef<Path>>(modules_dir: P) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory being scanned
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Directory of the module with the given id
    pub fn module_dir(&self, module_id: &str) -> PathBuf {
        self.modules_dir.join(module_id)
    }

    /// Ids of all immediate subdirectories that contain a manifest
    ///
    /// Sorted lexicographically so that independent modules get a stable
    /// load order. A missing modules directory yields no candidates.
    pub async fn candidate_ids(&self) -> Result<Vec<String>, ModuleError> {
        if !self.modules_dir.exists() {
            debug!("Modules directory {:?} does not exist", self.modules_dir);
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&self.modules_dir).await.map_err(|e| {
            ModuleError::OperationError(format!(
                "Failed to read modules directory {:?}: {}",
                self.modules_dir, e
            ))
        })?;

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ModuleError::OperationError(format!("Failed to read directory entry: {}", e))
        })? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            if !ModuleManifest::exists_in(&path) {
                debug!("No manifest found in {:?}, skipping", path);
                continue;
            }

            match entry.file_name().into_string() {
                Ok(id) => ids.push(id),
                Err(name) => warn!("Skipping module directory with non UTF-8 name: {:?}", name),
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Read the manifest of a specific module
    ///
    /// Warns when the manifest id disagrees with the directory name; the
    /// directory name stays authoritative.
    pub async fn discover_module(&self, module_id: &str) -> Result<DiscoveredModule, ModuleError> {
        let directory = self.module_dir(module_id);
        let manifest = ModuleManifest::from_dir(&directory).await?;

        if manifest.id != module_id {
            warn!(
                "Manifest id {} does not match module directory {}, using directory name",
                manifest.id, module_id
            );
        }

        Ok(DiscoveredModule {
            id: module_id.to_string(),
            directory,
            manifest,
        })
    }

    /// Discover all modules in the modules directory
    ///
    /// Modules whose manifest cannot be read are returned in the second list.
    pub async fn discover_modules(
        &self,
    ) -> Result<(Vec<DiscoveredModule>, Vec<(String, ModuleError)>), ModuleError> {
        info!("Discovering modules in {:?}", self.modules_dir);

        let mut modules = Vec::new();
        let mut failed = Vec::new();
        for id in self.candidate_ids().await? {
            match self.discover_module(&id).await {
                Ok(module) => modules.push(module),
                Err(e) => {
                    warn!("Failed to read manifest of module {}: {}", id, e);
                    failed.push((id, e));
                }
            }
        }

        info!("Discovered {} modules", modules.len());
        Ok((modules, failed))
    }
}
