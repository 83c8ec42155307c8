use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::{ModuleDescriptor, ModuleKind, SourceSet};

/// Adapter over the build system that knows the dependency graph.
///
/// Implementations list the modules of one variant and the declared source
/// directories of project modules; the core never inspects build-system types.
pub trait ModuleSource: Send + Sync {
    fn list_modules(&self) -> Vec<ModuleDescriptor>;

    /// Declared source directories; an empty set means "use conventional paths".
    fn source_dirs_for(&self, module: &ModuleDescriptor) -> SourceSet;
}

/// One module of a serialized inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub id: String,
    pub kind: ModuleKind,
    #[serde(default)]
    pub sources: SourceSet,
}

/// Module list exported by the build system (`{"modules": [...]}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInventory {
    pub modules: Vec<InventoryEntry>,
}

/// A `ModuleSource` backed by an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticModuleSource {
    entries: Vec<(ModuleDescriptor, SourceSet)>,
}

impl StaticModuleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, descriptor: ModuleDescriptor, sources: SourceSet) -> Self {
        self.entries.push((descriptor, sources));
        self
    }

    pub fn from_inventory(inventory: ModuleInventory) -> Self {
        let entries = inventory
            .modules
            .into_iter()
            .map(|e| (ModuleDescriptor::new(e.id, e.kind), e.sources))
            .collect();
        Self { entries }
    }

    /// Load an inventory JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module inventory at {}", path.display()))?;
        let inventory: ModuleInventory =
            serde_json::from_str(&raw).context("Failed to parse module inventory JSON")?;
        Ok(Self::from_inventory(inventory))
    }
}

impl ModuleSource for StaticModuleSource {
    fn list_modules(&self) -> Vec<ModuleDescriptor> {
        self.entries.iter().map(|(d, _)| d.clone()).collect()
    }

    fn source_dirs_for(&self, module: &ModuleDescriptor) -> SourceSet {
        self.entries
            .iter()
            .find(|(d, _)| d.id == module.id)
            .map(|(_, s)| s.clone())
            .unwrap_or_default()
    }
}
