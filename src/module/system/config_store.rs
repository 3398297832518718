//! Configuration store system module
//!
//! A single JSON document whose top-level keys are module ids and whose
//! values are module defined settings. Every mutation is written through to
//! disk before it returns. A missing or unreadable document never fails the
//! runtime: the store degrades to an empty document and logs the condition.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::module::traits::ModuleError;
use crate::utils::with_read_lock;

/// In-memory document type
pub type ConfigDocument = Map<String, Value>;

/// Persisted module configuration
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    document: RwLock<ConfigDocument>,
}

impl ConfigStore {
    /// Open the store backed by the document at `path`
    ///
    /// Never fails. A missing document is created empty; an unparsable one is
    /// logged and treated as empty until the next successful write.
    pub async fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        info!("Opening configuration store at {:?}", path);
        let document = Self::load_document(&path).await;
        Self {
            path,
            document: RwLock::new(document),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Settings stored for `module_id`, or `None` if absent
    pub async fn get_config(&self, module_id: &str) -> Option<Value> {
        with_read_lock(&self.document, |doc| doc.get(module_id).cloned()).await
    }

    /// Settings stored for `module_id` deserialized into `T`
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        module_id: &str,
    ) -> Result<Option<T>, ModuleError> {
        match self.get_config(module_id).await {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store settings for `module_id` and persist the document
    ///
    /// On persistence failure the in-memory change is rolled back.
    pub async fn set_config(&self, module_id: &str, value: Value) -> Result<(), ModuleError> {
        let mut doc = self.document.write().await;
        let previous = doc.insert(module_id.to_string(), value);

        if let Err(e) = Self::write_document(&self.path, &doc).await {
            match previous {
                Some(old) => doc.insert(module_id.to_string(), old),
                None => doc.remove(module_id),
            };
            return Err(e);
        }

        debug!("Configuration for module {} saved", module_id);
        Ok(())
    }

    /// Serialize `value` and store it for `module_id`
    pub async fn set_typed<T: Serialize>(&self, module_id: &str, value: &T) -> Result<(), ModuleError> {
        self.set_config(module_id, serde_json::to_value(value)?).await
    }

    /// Remove the settings of `module_id` and persist the document
    ///
    /// Returns the removed value. Removing an absent key still persists.
    pub async fn remove_config(&self, module_id: &str) -> Result<Option<Value>, ModuleError> {
        let mut doc = self.document.write().await;
        let previous = doc.remove(module_id);

        if let Err(e) = Self::write_document(&self.path, &doc).await {
            if let Some(old) = previous {
                doc.insert(module_id.to_string(), old);
            }
            return Err(e);
        }

        debug!("Configuration for module {} removed", module_id);
        Ok(previous)
    }

    /// Re-read the document from disk, discarding the in-memory state
    pub async fn reload_config(&self) {
        let fresh = Self::load_document(&self.path).await;
        *self.document.write().await = fresh;
        info!("Configuration reloaded from {:?}", self.path);
    }

    /// Module ids with stored settings, sorted
    pub async fn module_ids(&self) -> Vec<String> {
        let mut ids = with_read_lock(&self.document, |doc| doc.keys().cloned().collect::<Vec<_>>()).await;
        ids.sort();
        ids
    }

    /// Copy of the whole document
    pub async fn snapshot(&self) -> ConfigDocument {
        with_read_lock(&self.document, |doc| doc.clone()).await
    }

    async fn load_document(path: &Path) -> ConfigDocument {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No existing configuration found at {:?}, creating empty config", path);
                let empty = ConfigDocument::new();
                if let Err(e) = Self::write_document(path, &empty).await {
                    warn!("{}", e);
                }
                return empty;
            }
            Err(e) => {
                let err = ModuleError::ConfigPersistence(format!(
                    "Failed to read {:?}: {}, using empty config",
                    path, e
                ));
                error!("{}", err);
                return ConfigDocument::new();
            }
        };

        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(doc)) => {
                debug!("Loaded configuration for {} modules", doc.len());
                doc
            }
            Ok(other) => {
                let err = ModuleError::ConfigPersistence(format!(
                    "Top level of {:?} must be an object, found {}, using empty config",
                    path,
                    json_type_name(&other)
                ));
                error!("{}", err);
                ConfigDocument::new()
            }
            Err(e) => {
                let err = ModuleError::ConfigPersistence(format!(
                    "Failed to parse {:?}: {}, using empty config",
                    path, e
                ));
                error!("{}", err);
                ConfigDocument::new()
            }
        }
    }

    async fn write_document(path: &Path, doc: &ConfigDocument) -> Result<(), ModuleError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| persistence_error(path, e))?;
        }

        let contents = serde_json::to_string_pretty(doc).map_err(|e| persistence_error(path, e))?;
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| persistence_error(path, e))?;
        debug!("Configuration saved to {:?}", path);
        Ok(())
    }
}

fn persistence_error(path: &Path, e: impl std::fmt::Display) -> ModuleError {
    ModuleError::ConfigPersistence(format!("Failed to save {:?}: {}", path, e))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
