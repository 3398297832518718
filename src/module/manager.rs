//! Module manager for orchestrating all modules
//!
//! Owns the module registry, the load order and the capability registry.
//! Handles discovery, depth-first dependency resolution, initialize/cleanup
//! invocation with context injection, and unload safety checks.
//!
//! All work is awaited sequentially: no two modules are ever resolved
//! concurrently, so readers never observe a half-written registry.

use futures::future::BoxFuture;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::module::api::ApiHub;
use crate::module::loader::EntryRegistry;
use crate::module::registry::{dependents_of, ModuleDiscovery, ModuleManifest, ResolutionStack};
use crate::module::system::{ConfigStore, HostLogger};
use crate::module::validation::ManifestValidator;
use crate::module::traits::{
    is_system_module, Api, InitContext, InitOptions, ModuleContext, ModuleEntry, ModuleError,
    ModuleState, CONFIG_MODULE_ID, LOGGER_MODULE_ID,
};

/// Loaded module instance
struct ModuleRecord {
    /// Unique id of this load (changes when the module is loaded again)
    instance_id: String,
    /// Module manifest
    manifest: ModuleManifest,
    /// Context returned by the initializer
    context: Arc<ModuleContext>,
    /// Module implementation
    entry: Box<dyn ModuleEntry>,
}

/// Outcome of a discovery pass
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Modules loaded by this pass, in completion order
    pub loaded: Vec<String>,
    /// Top-level modules that failed to load
    pub failed: Vec<(String, ModuleError)>,
}

impl DiscoveryReport {
    /// Returns true if every discovered module loaded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true if some failure was caused by module structure
    pub fn has_structural_failures(&self) -> bool {
        self.failed.iter().any(|(_, e)| e.is_structural())
    }
}

/// Outcome of a full shutdown
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Modules removed, in unload order
    pub unloaded: Vec<String>,
    /// Cleanup failures (the modules were removed regardless)
    pub failures: Vec<(String, ModuleError)>,
}

/// Module manager coordinates all loaded modules
pub struct ModuleManager {
    /// Directory module ids are resolved against
    modules_dir: PathBuf,
    /// Entry points available to this host
    entries: EntryRegistry,
    /// Loaded modules (id -> record)
    modules: HashMap<String, ModuleRecord>,
    /// Ids in the order their initializers completed
    load_order: Vec<String>,
    /// Modules in a transient lifecycle state
    states: HashMap<String, ModuleState>,
    /// Ids currently being resolved
    resolving: ResolutionStack,
    /// Published apis
    api_hub: ApiHub,
    /// System module contexts (present once the runtime is initialized)
    system: HashMap<String, Arc<ModuleContext>>,
    /// Root logger published as the `logger` system module
    logger: HostLogger,
}

impl ModuleManager {
    /// Create a new module manager
    pub fn new<P: AsRef<Path>>(modules_dir: P, entries: EntryRegistry) -> Self {
        Self {
            modules_dir: modules_dir.as_ref().to_path_buf(),
            entries,
            modules: HashMap::new(),
            load_order: Vec::new(),
            states: HashMap::new(),
            resolving: ResolutionStack::new(),
            api_hub: ApiHub::new(),
            system: HashMap::new(),
            logger: HostLogger::default(),
        }
    }

    /// Use `logger` as the root of the `logger` system module
    pub fn with_logger(mut self, logger: HostLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Bring up the system modules
    ///
    /// Opens the configuration store at `config_path` and publishes it with
    /// the logger. Must run before any other module loads. Calling it again
    /// while initialized is a no-op.
    pub async fn initialize_runtime<P: AsRef<Path>>(&mut self, config_path: P) -> Result<(), ModuleError> {
        if self.is_initialized() {
            warn!("Module runtime already initialized, ignoring");
            return Ok(());
        }

        info!("Initializing module runtime");

        let logger_api: Api = Arc::new(self.logger.clone());
        self.install_system_module(LOGGER_MODULE_ID, logger_api).await;

        let store = ConfigStore::open(config_path).await;
        let store_api: Api = Arc::new(store);
        self.install_system_module(CONFIG_MODULE_ID, store_api).await;

        info!("Module runtime initialized");
        Ok(())
    }

    async fn install_system_module(&mut self, id: &str, api: Api) {
        self.api_hub.register(id, Arc::clone(&api)).await;
        self.system
            .insert(id.to_string(), Arc::new(ModuleContext::from_shared_api(api)));
        debug!("System module {} installed", id);
    }

    /// Returns true once the system modules are installed
    pub fn is_initialized(&self) -> bool {
        self.system.contains_key(CONFIG_MODULE_ID)
    }

    fn ensure_initialized(&self) -> Result<(), ModuleError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ModuleError::RuntimeNotInitialized)
        }
    }

    /// Discover and load every module under `root_dir`
    ///
    /// Immediate subdirectories holding a manifest are resolved in
    /// lexicographic order. A failing module is logged and skipped without
    /// affecting independent modules. `root_dir` becomes the directory later
    /// [`load_module`](Self::load_module) calls resolve against.
    pub async fn discover_and_load_all<P: AsRef<Path>>(
        &mut self,
        root_dir: P,
        options: InitOptions,
    ) -> Result<DiscoveryReport, ModuleError> {
        self.ensure_initialized()?;
        self.modules_dir = root_dir.as_ref().to_path_buf();

        info!("Discovering and loading modules from {:?}", self.modules_dir);

        let candidates = ModuleDiscovery::new(&self.modules_dir).candidate_ids().await?;
        let already_loaded = self.load_order.len();
        let mut report = DiscoveryReport::default();

        for module_id in candidates {
            if is_system_module(&module_id) {
                warn!(
                    "Module directory {} uses a reserved system module id, skipping",
                    module_id
                );
                continue;
            }
            if let Err(e) = self.resolve(&module_id, &options).await {
                error!("Failed to load module {}: {}", module_id, e);
                report.failed.push((module_id, e));
            }
        }

        report.loaded = self.load_order[already_loaded..].to_vec();
        info!(
            "Loaded {} modules ({} failed)",
            report.loaded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Load a single module and everything it depends on
    ///
    /// Returns the module's context. Loading a module that is already loaded
    /// returns the stored context without invoking anything. An id that is
    /// not a valid module id (e.g. a path) fails with `ModuleNotFound`.
    pub async fn load_module(
        &mut self,
        module_id: &str,
        options: InitOptions,
    ) -> Result<Arc<ModuleContext>, ModuleError> {
        self.ensure_initialized()?;
        if !is_system_module(module_id) && !ManifestValidator::new().is_valid_id(module_id) {
            return Err(ModuleError::ModuleNotFound(format!(
                "{} (not a valid module id)",
                module_id
            )));
        }
        self.resolve(module_id, &options).await
    }

    /// Depth-first resolution of `module_id`
    fn resolve<'a>(
        &'a mut self,
        module_id: &'a str,
        options: &'a InitOptions,
    ) -> BoxFuture<'a, Result<Arc<ModuleContext>, ModuleError>> {
        Box::pin(async move {
            if let Some(context) = self.system.get(module_id) {
                return Ok(Arc::clone(context));
            }

            if let Some(record) = self.modules.get(module_id) {
                debug!("Module {} is already loaded", module_id);
                return Ok(Arc::clone(&record.context));
            }

            self.resolving.enter(module_id)?;
            self.states
                .insert(module_id.to_string(), ModuleState::Resolving);

            let result = self.resolve_and_initialize(module_id, options).await;

            self.resolving.leave(module_id);
            self.states.remove(module_id);
            result
        })
    }

    async fn resolve_and_initialize(
        &mut self,
        module_id: &str,
        options: &InitOptions,
    ) -> Result<Arc<ModuleContext>, ModuleError> {
        info!("Loading module {}", module_id);

        let discovered = ModuleDiscovery::new(&self.modules_dir)
            .discover_module(module_id)
            .await?;
        let manifest = discovered.manifest;
        let entry = self.entries.instantiate(module_id, &manifest)?;

        let mut dependencies: HashMap<String, Arc<ModuleContext>> = self
            .system
            .iter()
            .map(|(id, ctx)| (id.clone(), Arc::clone(ctx)))
            .collect();

        for dep_id in &manifest.dependencies {
            let context = self.resolve(dep_id, options).await?;
            dependencies.insert(dep_id.clone(), context);
        }

        self.states
            .insert(module_id.to_string(), ModuleState::Initializing);

        let init_context = InitContext {
            module_id: module_id.to_string(),
            dependencies,
            options: options.clone(),
        };

        let context = entry
            .initialize(init_context)
            .await
            .map_err(|e| match e {
                ModuleError::InitializationError { .. } => e,
                other => ModuleError::InitializationError {
                    module: module_id.to_string(),
                    reason: other.to_string(),
                },
            })?;
        let context = Arc::new(context);

        if let Some(api) = context.api() {
            self.api_hub.register(module_id, Arc::clone(api)).await;
        }

        let record = ModuleRecord {
            instance_id: format!("{}_{}", module_id, uuid::Uuid::new_v4()),
            manifest,
            context: Arc::clone(&context),
            entry,
        };
        self.modules.insert(module_id.to_string(), record);
        self.load_order.push(module_id.to_string());

        info!("Module {} loaded successfully", module_id);
        Ok(context)
    }

    /// Unload a module
    ///
    /// Refused with `DependencyConflict` while another loaded module declares
    /// it as a dependency. Unloading a module that is not loaded is a no-op.
    /// If cleanup fails the error is returned and the module stays loaded.
    pub async fn unload_module(&mut self, module_id: &str) -> Result<(), ModuleError> {
        if is_system_module(module_id) {
            return Err(ModuleError::SystemModule(module_id.to_string()));
        }

        if !self.modules.contains_key(module_id) {
            info!("Module {} is not loaded", module_id);
            return Ok(());
        }

        let dependents = dependents_of(
            module_id,
            self.modules.iter().map(|(id, record)| (id, &record.manifest)),
        );
        if !dependents.is_empty() {
            return Err(ModuleError::DependencyConflict {
                module: module_id.to_string(),
                dependents,
            });
        }

        info!("Unloading module {}", module_id);
        self.states
            .insert(module_id.to_string(), ModuleState::Unloading);

        let cleanup = match self.modules.get(module_id) {
            Some(record) if record.entry.has_cleanup() => record.entry.cleanup().await,
            _ => Ok(()),
        };

        if let Err(e) = cleanup {
            self.states.remove(module_id);
            return Err(ModuleError::CleanupError {
                module: module_id.to_string(),
                reason: e.to_string(),
            });
        }

        self.remove_module(module_id).await;
        info!("Module {} unloaded successfully", module_id);
        Ok(())
    }

    /// Unload every module in reverse load order, then the system modules
    ///
    /// A cleanup failure is logged and recorded; the sweep always continues,
    /// and afterwards every registry is empty and the runtime must be
    /// initialized again before further loads.
    pub async fn unload_all_modules(&mut self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let unload_order: Vec<String> = self.load_order.iter().rev().cloned().collect();

        for module_id in unload_order {
            self.states.insert(module_id.clone(), ModuleState::Unloading);

            let cleanup = match self.modules.get(&module_id) {
                Some(record) if record.entry.has_cleanup() => record.entry.cleanup().await,
                _ => Ok(()),
            };

            if let Err(e) = cleanup {
                let err = ModuleError::CleanupError {
                    module: module_id.clone(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                report.failures.push((module_id.clone(), err));
            }

            self.remove_module(&module_id).await;
            info!("Module {} unloaded", module_id);
            report.unloaded.push(module_id);
        }

        // Records can only exist alongside a load order entry, but never leave
        // anything behind on shutdown.
        let leftovers: Vec<String> = self.modules.keys().cloned().collect();
        for module_id in leftovers {
            warn!("Module {} missing from load order, removing", module_id);
            self.remove_module(&module_id).await;
        }

        self.system.clear();
        self.api_hub.clear().await;
        self.states.clear();

        info!("All modules unloaded");
        report
    }

    async fn remove_module(&mut self, module_id: &str) {
        self.modules.remove(module_id);
        self.load_order.retain(|id| id != module_id);
        self.api_hub.unregister(module_id).await;
        self.states.remove(module_id);
    }

    /// Api published by `module_id`
    pub async fn get_api(&self, module_id: &str) -> Result<Api, ModuleError> {
        self.api_hub.get(module_id).await
    }

    /// Api published by `module_id`, downcast to `T`
    pub async fn get_api_as<T: Any + Send + Sync>(&self, module_id: &str) -> Result<Arc<T>, ModuleError> {
        self.api_hub.get_as::<T>(module_id).await
    }

    /// Context of a loaded module (or system module), `None` if absent
    pub fn get_module_context(&self, module_id: &str) -> Option<Arc<ModuleContext>> {
        self.system
            .get(module_id)
            .or_else(|| self.modules.get(module_id).map(|r| &r.context))
            .cloned()
    }

    /// Manifest of a loaded module
    pub fn manifest(&self, module_id: &str) -> Option<&ModuleManifest> {
        self.modules.get(module_id).map(|r| &r.manifest)
    }

    /// Instance id of a loaded module
    pub fn instance_id(&self, module_id: &str) -> Option<&str> {
        self.modules.get(module_id).map(|r| r.instance_id.as_str())
    }

    /// Ids in the order their initializers completed
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Loaded module ids, in load order
    pub fn loaded_module_ids(&self) -> Vec<String> {
        self.load_order.clone()
    }

    /// Returns true if `module_id` is loaded (system modules included)
    pub fn is_loaded(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id) || self.system.contains_key(module_id)
    }

    /// Lifecycle state of `module_id`
    pub fn module_state(&self, module_id: &str) -> ModuleState {
        if let Some(state) = self.states.get(module_id) {
            return *state;
        }
        if self.is_loaded(module_id) {
            ModuleState::Loaded
        } else {
            ModuleState::Unloaded
        }
    }

    /// Shared read handle to the capability registry
    pub fn api_hub(&self) -> ApiHub {
        self.api_hub.clone()
    }

    /// The configuration store, once the runtime is initialized
    pub fn config_store(&self) -> Option<Arc<ConfigStore>> {
        self.system
            .get(CONFIG_MODULE_ID)
            .and_then(|ctx| ctx.api_as::<ConfigStore>())
    }

    /// Root logger of the `logger` system module
    pub fn logger(&self) -> &HostLogger {
        &self.logger
    }

    /// Directory module ids are resolved against
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Entry points available to this host
    pub fn entries(&self) -> &EntryRegistry {
        &self.entries
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules_dir", &self.modules_dir)
            .field("load_order", &self.load_order)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
