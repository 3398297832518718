//! Module entry point registry
//!
//! Maps entry point names to factories producing [`ModuleEntry`] instances.
//! This is how the host "loads" the code behind a discovered manifest: the
//! manifest names an entry (its `entry` field, or its id), and the entry must
//! have been registered by the host before the module is resolved.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::{ModuleEntry, ModuleError};

/// Factory producing a fresh module instance for every load
pub type EntryFactory = Arc<dyn Fn() -> Box<dyn ModuleEntry> + Send + Sync>;

/// Registry of module entry points
#[derive(Clone, Default)]
pub struct EntryRegistry {
    factories: HashMap<String, EntryFactory>,
}

impl EntryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ModuleEntry> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering module entry point: {}", name);
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Register a module type constructed with `Default`
    pub fn register_default<M>(&mut self, name: impl Into<String>) -> &mut Self
    where
        M: ModuleEntry + Default + 'static,
    {
        self.register(name, || Box::new(M::default()) as Box<dyn ModuleEntry>)
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ModuleEntry> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Returns true if an entry point named `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered entry point names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Instantiate the entry point of a module
    ///
    /// Fails with `InvalidEntryPoint` when the manifest names an entry that
    /// was never registered.
    pub fn instantiate(
        &self,
        module_id: &str,
        manifest: &ModuleManifest,
    ) -> Result<Box<dyn ModuleEntry>, ModuleError> {
        let entry = manifest.entry_name();
        let factory = self.factories.get(entry).ok_or_else(|| {
            ModuleError::InvalidEntryPoint(format!(
                "Module {} does not provide an initialize entry point (no entry registered as {})",
                module_id, entry
            ))
        })?;
        Ok(factory())
    }
}

impl fmt::Debug for EntryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRegistry")
            .field("entries", &self.names())
            .finish()
    }
}
