//! Module dependency resolution
//!
//! Cycle tracking for on-demand resolution and dry-run planning of the load
//! order over a set of discovered modules.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::module::registry::discovery::DiscoveredModule;
use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::{is_system_module, ModuleError};

/// Ids currently being resolved, in resolution order
///
/// This is the "in progress" set of a depth-first resolution. It is kept
/// separate from the set of loaded modules so that re-entering an id that is
/// still resolving is reported as a cycle instead of recursing forever.
#[derive(Debug, Default)]
pub struct ResolutionStack {
    path: Vec<String>,
}

impl ResolutionStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as in progress
    ///
    /// Fails with `CyclicDependency` naming the cycle if `id` is already in
    /// progress.
    pub fn enter(&mut self, id: &str) -> Result<(), ModuleError> {
        if let Some(start) = self.path.iter().position(|p| p == id) {
            let mut cycle: Vec<String> = self.path[start..].to_vec();
            cycle.push(id.to_string());
            return Err(ModuleError::CyclicDependency { cycle });
        }
        self.path.push(id.to_string());
        Ok(())
    }

    /// Mark `id` as no longer in progress
    pub fn leave(&mut self, id: &str) {
        if let Some(pos) = self.path.iter().rposition(|p| p == id) {
            self.path.remove(pos);
        }
    }

    /// Returns true if `id` is in progress
    pub fn contains(&self, id: &str) -> bool {
        self.path.iter().any(|p| p == id)
    }

    /// Ids in progress, outermost first
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Returns true if nothing is being resolved
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

/// Ids of modules whose manifest declares `id` as a dependency, sorted
pub fn dependents_of<'a, I>(id: &str, manifests: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a String, &'a ModuleManifest)>,
{
    let mut dependents: Vec<String> = manifests
        .into_iter()
        .filter(|(other, manifest)| other.as_str() != id && manifest.depends_on(id))
        .map(|(other, _)| other.clone())
        .collect();
    dependents.sort();
    dependents
}

/// Dry-run dependency plan
#[derive(Debug, Clone, Default)]
pub struct DependencyPlan {
    /// Modules in load order (dependencies first)
    pub load_order: Vec<String>,
    /// Modules that cannot load, with the missing dependency ids they need
    pub blocked: BTreeMap<String, Vec<String>>,
}

impl DependencyPlan {
    /// Every dependency id that is neither discovered nor a system module
    pub fn missing(&self) -> BTreeSet<String> {
        self.blocked.values().flatten().cloned().collect()
    }
}

/// Dependency planner
pub struct ModuleDependencies;

impl ModuleDependencies {
    /// Plan the load order of the discovered modules without loading anything
    ///
    /// System module ids are always satisfied. A module with a missing
    /// dependency (directly or through another blocked module) is reported in
    /// `blocked` and left out of the order. The order is the one
    /// [`discover_and_load_all`](crate::module::ModuleManager::discover_and_load_all)
    /// produces: module ids are walked in lexicographic order and each module
    /// follows its dependencies, visited depth first in declaration order.
    pub fn plan(discovered: &[DiscoveredModule]) -> Result<DependencyPlan, ModuleError> {
        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for module in discovered.iter().filter(|m| !is_system_module(&m.id)) {
            let deps = module
                .manifest
                .dependencies
                .iter()
                .filter(|d| !is_system_module(d))
                .cloned()
                .collect();
            dependencies.insert(module.id.clone(), deps);
        }

        if let Some(cycle) = Self::find_cycle(&dependencies) {
            return Err(ModuleError::CyclicDependency { cycle });
        }

        let blocked = Self::blocked_modules(&dependencies);

        // Same walk as the runtime: candidates in id order, each one after
        // its dependencies in declaration order
        let mut loaded: HashSet<&str> = HashSet::new();
        let mut failed: HashSet<&str> = HashSet::new();
        let mut load_order = Vec::with_capacity(dependencies.len());
        for id in dependencies.keys() {
            Self::visit(id, &dependencies, &mut loaded, &mut failed, &mut load_order);
        }

        debug!("Dependency plan complete: {:?}", load_order);

        Ok(DependencyPlan {
            load_order,
            blocked,
        })
    }

    /// Post-order visit of `id`, returning false if it cannot load
    ///
    /// Only called on acyclic graphs.
    fn visit<'a>(
        id: &'a str,
        dependencies: &'a BTreeMap<String, Vec<String>>,
        loaded: &mut HashSet<&'a str>,
        failed: &mut HashSet<&'a str>,
        load_order: &mut Vec<String>,
    ) -> bool {
        if loaded.contains(id) {
            return true;
        }
        if failed.contains(id) {
            return false;
        }
        let Some(deps) = dependencies.get(id) else {
            return false;
        };

        for dep in deps {
            if !Self::visit(dep, dependencies, loaded, failed, load_order) {
                failed.insert(id);
                return false;
            }
        }

        loaded.insert(id);
        load_order.push(id.to_string());
        true
    }

    /// Modules that (transitively) depend on an unknown id
    fn blocked_modules(dependencies: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
        let mut blocked: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (id, deps) in dependencies {
            let missing: Vec<String> = deps
                .iter()
                .filter(|d| !dependencies.contains_key(*d))
                .cloned()
                .collect();
            if !missing.is_empty() {
                blocked.insert(id.clone(), missing);
            }
        }

        // Propagate to dependents until nothing changes
        loop {
            let newly_blocked: Vec<(String, Vec<String>)> = dependencies
                .iter()
                .filter(|(id, _)| !blocked.contains_key(*id))
                .filter_map(|(id, deps)| {
                    let inherited: Vec<String> = deps
                        .iter()
                        .filter_map(|d| blocked.get(d))
                        .flatten()
                        .cloned()
                        .collect();
                    (!inherited.is_empty()).then(|| (id.clone(), inherited))
                })
                .collect();

            if newly_blocked.is_empty() {
                break;
            }
            for (id, mut missing) in newly_blocked {
                missing.sort();
                missing.dedup();
                blocked.insert(id, missing);
            }
        }

        blocked
    }

    /// Detect a cycle with DFS path tracking, returning the closed cycle path
    fn find_cycle(dependencies: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs<'a>(
            node: &'a str,
            dependencies: &'a BTreeMap<String, Vec<String>>,
            colors: &mut HashMap<&'a str, Color>,
            path: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            colors.insert(node, Color::Gray);
            path.push(node);

            for dep in dependencies.get(node).into_iter().flatten() {
                match colors.get(dep.as_str()).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        let start = path.iter().position(|n| *n == dep.as_str())?;
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Color::White if dependencies.contains_key(dep) => {
                        if let Some(cycle) = dfs(dep, dependencies, colors, path) {
                            return Some(cycle);
                        }
                    }
                    _ => {}
                }
            }

            path.pop();
            colors.insert(node, Color::Black);
            None
        }

        let mut colors: HashMap<&str, Color> = HashMap::new();
        let mut path = Vec::new();
        for id in dependencies.keys() {
            if colors.get(id.as_str()).copied().unwrap_or(Color::White) == Color::White {
                if let Some(cycle) = dfs(id, dependencies, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}
