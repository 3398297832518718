//! Capability registry
//!
//! Process-wide mapping from module id to the api object that module
//! published. The module manager is the only writer; any number of readers
//! may hold a cloned handle.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::module::traits::{Api, ModuleError};
use crate::utils::{with_read_lock, with_write_lock};

/// Shared handle to the capability registry
#[derive(Clone, Default)]
pub struct ApiHub {
    apis: Arc<RwLock<HashMap<String, Api>>>,
}

impl ApiHub {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `api` under `module_id`, replacing any previous entry
    pub(crate) async fn register(&self, module_id: &str, api: Api) {
        debug!("Registering API for module {}", module_id);
        with_write_lock(&self.apis, |apis| {
            apis.insert(module_id.to_string(), api);
        })
        .await;
    }

    /// Remove the api published under `module_id`
    pub(crate) async fn unregister(&self, module_id: &str) -> Option<Api> {
        debug!("Unregistering API for module {}", module_id);
        with_write_lock(&self.apis, |apis| apis.remove(module_id)).await
    }

    /// Remove every entry
    pub(crate) async fn clear(&self) {
        with_write_lock(&self.apis, |apis| apis.clear()).await;
    }

    /// Api published under `module_id`
    pub async fn get(&self, module_id: &str) -> Result<Api, ModuleError> {
        with_read_lock(&self.apis, |apis| apis.get(module_id).cloned())
            .await
            .ok_or_else(|| ModuleError::ApiNotFound(module_id.to_string()))
    }

    /// Api published under `module_id`, downcast to `T`
    pub async fn get_as<T: Any + Send + Sync>(&self, module_id: &str) -> Result<Arc<T>, ModuleError> {
        self.get(module_id).await?.downcast::<T>().map_err(|_| {
            ModuleError::ApiNotFound(format!(
                "{} (published api has a different type)",
                module_id
            ))
        })
    }

    /// Returns true if `module_id` published an api
    pub async fn contains(&self, module_id: &str) -> bool {
        with_read_lock(&self.apis, |apis| apis.contains_key(module_id)).await
    }

    /// Ids with a published api, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids = with_read_lock(&self.apis, |apis| apis.keys().cloned().collect::<Vec<_>>()).await;
        ids.sort();
        ids
    }

    /// Number of published apis
    pub async fn len(&self) -> usize {
        with_read_lock(&self.apis, |apis| apis.len()).await
    }

    /// Returns true if nothing is published
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
