use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// FU name -> member module indices.
pub type FunctionalUnitMap = BTreeMap<String, BTreeSet<u32>>;

/// Negative index -> FU name, used by file and package overrides.
pub type FuIndex = BTreeMap<i32, String>;

/// Dense, sorted, deduplicated list of module ids.
///
/// The position of an id is its index in every persisted table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleIndex {
    ids: Vec<String>,
}

impl ModuleIndex {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        Self { ids: unique.into_iter().collect() }
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.ids.binary_search_by(|probe| probe.as_str().cmp(id)).ok().map(|i| i as u32)
    }

    pub fn id(&self, index: u32) -> Option<&str> {
        self.ids.get(index as usize).map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// SHA-256 over the ordered ids; ties the three tables to one generation run.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for id in &self.ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// `module-metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleMetadata {
    pub modules: ModuleIndex,
    pub functional_units: FunctionalUnitMap,
    pub variant: String,
    pub dynamic_features: Vec<String>,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub module_fingerprint: String,
}

impl ModuleMetadata {
    /// FU owning each module index, inverted from `functional_units`.
    pub fn fu_by_module(&self) -> BTreeMap<u32, &str> {
        let mut out = BTreeMap::new();
        for (fu, indices) in &self.functional_units {
            for index in indices {
                out.insert(*index, fu.as_str());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub total_paths: usize,
    pub collisions: usize,
    pub overridden_paths: usize,
    pub unmatched_override_files: usize,
    pub module_fingerprint: String,
}

/// `resource-mapping.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMappingTable {
    /// Path -> module indices (>= 0) or an FU override key (< 0).
    pub resource_mapping: BTreeMap<String, Vec<i32>>,
    pub fu_index: FuIndex,
    pub summary: ResourceSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSummary {
    pub total_packages: usize,
    pub total_classes: u64,
    pub ignored_packages: usize,
    pub overridden_packages: usize,
    pub module_fingerprint: String,
}

/// `package-mapping.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMappingTable {
    /// Package -> `(index, class count)`; negative indices are FU overrides.
    pub package_mapping: BTreeMap<String, Vec<(i32, u32)>>,
    pub summary: PackageSummary,
}

/// The three tables produced by one mapping generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTables {
    pub metadata: ModuleMetadata,
    pub resources: ResourceMappingTable,
    pub packages: PackageMappingTable,
}

impl MappingTables {
    /// FU name for a table index: module indices via the FU map, negative ones via `fuIndex`.
    pub fn fu_for_index(&self, index: i32) -> Option<&str> {
        if index < 0 {
            self.resources.fu_index.get(&index).map(String::as_str)
        } else {
            let index = index as u32;
            self.metadata
                .functional_units
                .iter()
                .find(|(_, members)| members.contains(&index))
                .map(|(fu, _)| fu.as_str())
        }
    }
}
