//! Assembly of the module-metadata, resource-mapping, and package-mapping tables.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{PackageOverride, SizeConfig};
use crate::glob::GlobSet;
use crate::mapping::index::{assign_functional_units, feature_name};
use crate::mapping::tables::{
    FuIndex, MappingTables, ModuleIndex, ModuleMetadata, PackageMappingTable, PackageSummary,
    ResourceMappingTable, ResourceSummary,
};
use crate::model::{package_depth, ModuleKind, ScannedModule, DEFAULT_PACKAGE};
use crate::scanner::native_libs::is_abi;
use crate::scanner::resources::resource_file;
use crate::scanner::walk_files;

/// Bundle directory for files of the base module.
pub const BASE_MODULE_DIR: &str = "base";

/// Hands out negative FU indices in first-use order (`-1`, `-2`, ...).
#[derive(Debug, Default)]
struct FuIndexAllocator {
    index: FuIndex,
    by_name: HashMap<String, i32>,
}

impl FuIndexAllocator {
    fn index_of(&mut self, fu: &str) -> i32 {
        if let Some(existing) = self.by_name.get(fu) {
            return *existing;
        }
        let next = -(self.index.len() as i32) - 1;
        self.index.insert(next, fu.to_string());
        self.by_name.insert(fu.to_string(), next);
        next
    }
}

/// Builds the persisted tables from scan results.
pub struct MappingEmitter<'a> {
    config: &'a SizeConfig,
    project_root: Option<PathBuf>,
}

impl<'a> MappingEmitter<'a> {
    pub fn new(config: &'a SizeConfig) -> Self {
        Self { config, project_root: None }
    }

    /// Resolve relative directory overrides against `root`.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn emit(&self, modules: &[ScannedModule], generated_at: impl Into<String>) -> MappingTables {
        let index = ModuleIndex::from_ids(modules.iter().map(|m| m.id.clone()));
        let fingerprint = index.fingerprint();
        let functional_units = assign_functional_units(&index, &self.config.functional_unit_mapping);

        // Scan results in index order; duplicate ids keep their first result.
        let mut by_index: Vec<Option<&ScannedModule>> = vec![None; index.len()];
        for module in modules {
            if let Some(i) = index.index_of(&module.id) {
                by_index[i as usize].get_or_insert(module);
            }
        }
        let ordered: Vec<(i32, &ScannedModule)> =
            by_index.iter().enumerate().filter_map(|(i, m)| m.map(|m| (i as i32, m))).collect();

        let mut dynamic_features: Vec<String> = ordered
            .iter()
            .filter(|(_, m)| matches!(m.kind, ModuleKind::DynamicFeature { .. }))
            .map(|(_, m)| feature_name(&m.id))
            .collect();
        dynamic_features.sort();
        dynamic_features.dedup();

        let mut allocator = FuIndexAllocator::default();
        let mut resources = self.resource_mapping(&ordered, &mut allocator, &fingerprint);
        let packages = self.package_mapping(&ordered, &mut allocator, &fingerprint);
        // Package overrides share the negative index space stored with the resource table.
        resources.fu_index = allocator.index;

        info!(
            variant = %self.config.variant,
            modules = index.len(),
            functional_units = functional_units.len(),
            paths = resources.summary.total_paths,
            collisions = resources.summary.collisions,
            packages = packages.summary.total_packages,
            "emitted mapping tables"
        );

        MappingTables {
            metadata: ModuleMetadata {
                modules: index,
                functional_units,
                variant: self.config.variant.clone(),
                dynamic_features,
                generated_at: generated_at.into(),
                module_fingerprint: fingerprint,
            },
            resources,
            packages,
        }
    }

    fn resource_mapping(
        &self,
        modules: &[(i32, &ScannedModule)],
        allocator: &mut FuIndexAllocator,
        fingerprint: &str,
    ) -> ResourceMappingTable {
        let mut mapping: BTreeMap<String, Vec<i32>> = BTreeMap::new();
        for (index, module) in modules {
            let dir = module_dir(module);
            for file in &module.mapped_files {
                let entry = mapping.entry(format!("{dir}/{file}")).or_default();
                if !entry.contains(index) {
                    entry.push(*index);
                }
            }
        }

        let collisions = mapping.values().filter(|indices| indices.len() > 1).count();
        if collisions > 0 {
            warn!(collisions, "same artifact path contributed by several modules");
        }

        let mut overrides: BTreeMap<String, i32> = BTreeMap::new();
        let unmatched_override_files = self.directory_overrides(&mapping, allocator, &mut overrides);

        // Pattern overrides win over directory overrides.
        let pattern_sets: Vec<(&str, GlobSet)> = self
            .config
            .resource_fu_overrides
            .iter()
            .map(|(fu, patterns)| (fu, GlobSet::new(patterns)))
            .collect();
        if !pattern_sets.is_empty() {
            for path in mapping.keys() {
                if let Some((fu, _)) = pattern_sets.iter().find(|(_, globs)| globs.matches_any(path)) {
                    overrides.insert(path.clone(), allocator.index_of(fu));
                }
            }
        }

        for (path, fu_index) in &overrides {
            if let Some(entry) = mapping.get_mut(path) {
                *entry = vec![*fu_index];
            }
        }

        ResourceMappingTable {
            summary: ResourceSummary {
                total_paths: mapping.len(),
                collisions,
                overridden_paths: overrides.len(),
                unmatched_override_files,
                module_fingerprint: fingerprint.to_string(),
            },
            resource_mapping: mapping,
            fu_index: FuIndex::new(),
        }
    }

    /// Match files under override directories to mapped paths.
    ///
    /// Each file is reduced to its artifact-relative shape and compared with
    /// mapped paths minus their module directory. Returns the number of
    /// override files that matched no mapped path.
    fn directory_overrides(
        &self,
        mapping: &BTreeMap<String, Vec<i32>>,
        allocator: &mut FuIndexAllocator,
        overrides: &mut BTreeMap<String, i32>,
    ) -> usize {
        if self.config.resource_dir_fu_overrides.is_empty() {
            return 0;
        }
        let mut by_inner: HashMap<&str, Vec<&str>> = HashMap::new();
        for path in mapping.keys() {
            if let Some((_, inner)) = path.split_once('/') {
                by_inner.entry(inner).or_default().push(path.as_str());
            }
        }

        let mut unmatched = 0;
        for (fu, dirs) in self.config.resource_dir_fu_overrides.iter() {
            for dir in dirs {
                let dir = self.resolve_dir(dir);
                let files = match walk_files(&dir) {
                    Ok(files) => files,
                    Err(err) => {
                        warn!(fu = %fu, dir = %dir.display(), %err, "cannot walk override directory");
                        continue;
                    }
                };
                for file in files {
                    let paths = artifact_relative_forms(&file)
                        .into_iter()
                        .find_map(|form| by_inner.get(form.as_str()));
                    match paths {
                        Some(paths) => {
                            let fu_index = allocator.index_of(fu);
                            for path in paths {
                                overrides.insert((*path).to_string(), fu_index);
                            }
                        }
                        None => unmatched += 1,
                    }
                }
            }
        }
        unmatched
    }

    fn resolve_dir(&self, dir: &str) -> PathBuf {
        let path = Path::new(dir);
        match &self.project_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn package_mapping(
        &self,
        modules: &[(i32, &ScannedModule)],
        allocator: &mut FuIndexAllocator,
        fingerprint: &str,
    ) -> PackageMappingTable {
        let mut mapping: BTreeMap<String, Vec<(i32, u32)>> = BTreeMap::new();
        let mut total_classes = 0u64;
        let mut ignored_packages = 0;
        let mut overridden_packages = 0;

        for (index, module) in modules {
            for (package, count) in &module.classes_by_package {
                let package = truncate_package(package, self.config.package_depth);
                let target = match self.package_override(&package) {
                    Some(PackageOverride::Ignore) => {
                        ignored_packages += 1;
                        continue;
                    }
                    Some(PackageOverride::Fu(fu)) => {
                        overridden_packages += 1;
                        allocator.index_of(fu)
                    }
                    None => *index,
                };
                total_classes += u64::from(*count);
                for ancestor in ancestors(&package, self.config.min_package_depth) {
                    merge_entry(mapping.entry(ancestor).or_default(), target, *count);
                }
            }
        }
        for entries in mapping.values_mut() {
            entries.sort_by_key(|(index, _)| *index);
        }

        PackageMappingTable {
            summary: PackageSummary {
                total_packages: mapping.len(),
                total_classes,
                ignored_packages,
                overridden_packages,
                module_fingerprint: fingerprint.to_string(),
            },
            package_mapping: mapping,
        }
    }

    /// Longest `packageOverrides` prefix covering `package`.
    fn package_override(&self, package: &str) -> Option<&PackageOverride> {
        self.config
            .package_overrides
            .iter()
            .filter(|(prefix, _)| is_same_or_descendant(package, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, value)| value)
    }
}

/// Artifact-relative shapes a source file can ship as, most specific first:
/// `res/<qualifier>/<file>`, `lib/<abi>/<name>.so`, then `assets/<path>`.
pub fn artifact_relative_forms(file: &Path) -> Vec<String> {
    let parts: Vec<String> =
        file.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    let n = parts.len();
    let mut forms = Vec::new();
    if n >= 3 && parts[n - 3] == "res" {
        if let Some(res) = resource_file(&format!("{}/{}", parts[n - 2], parts[n - 1])) {
            forms.push(res.mapped_path);
        }
    }
    if n >= 2 && is_abi(&parts[n - 2]) && parts[n - 1].ends_with(".so") {
        forms.push(format!("lib/{}/{}", parts[n - 2], parts[n - 1]));
    }
    if let Some(pos) = parts.iter().rposition(|p| p == "assets") {
        if pos + 1 < n {
            forms.push(format!("assets/{}", parts[pos + 1..].join("/")));
        }
    }
    forms
}

fn module_dir(module: &ScannedModule) -> String {
    match module.kind {
        ModuleKind::DynamicFeature { .. } => feature_name(&module.id),
        ModuleKind::RemoteLibrary { .. }
        | ModuleKind::RemoteArchive { .. }
        | ModuleKind::LocalModule { .. }
        | ModuleKind::AppModule { .. } => BASE_MODULE_DIR.to_string(),
    }
}

/// True when `package` equals `prefix` or is nested below it.
pub fn is_same_or_descendant(package: &str, prefix: &str) -> bool {
    package == prefix
        || (package.len() > prefix.len()
            && package.starts_with(prefix)
            && package.as_bytes()[prefix.len()] == b'.')
}

/// Keep at most `depth` dotted segments.
pub fn truncate_package(package: &str, depth: u32) -> String {
    if package == DEFAULT_PACKAGE || package_depth(package) <= depth {
        return package.to_string();
    }
    package.split('.').take(depth as usize).collect::<Vec<_>>().join(".")
}

/// The package itself followed by its dotted prefixes down to `min_depth` segments.
pub fn ancestors(package: &str, min_depth: u32) -> Vec<String> {
    let mut out = vec![package.to_string()];
    if package == DEFAULT_PACKAGE {
        return out;
    }
    let mut current = package;
    while let Some((parent, _)) = current.rsplit_once('.') {
        if package_depth(parent) < min_depth {
            break;
        }
        out.push(parent.to_string());
        current = parent;
    }
    out
}

fn merge_entry(entries: &mut Vec<(i32, u32)>, index: i32, count: u32) {
    match entries.iter_mut().find(|(i, _)| *i == index) {
        Some(entry) => entry.1 += count,
        None => entries.push((index, count)),
    }
}
