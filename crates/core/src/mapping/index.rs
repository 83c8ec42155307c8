//! Module filtering, dense module indices, and FU partitioning.

use std::collections::BTreeSet;

use tracing::debug;

use crate::config::{OrderedMap, SizeConfig};
use crate::glob::{normalize_id, GlobSet, ModuleFilter};
use crate::mapping::tables::{FunctionalUnitMap, ModuleIndex};
use crate::model::{ModuleDescriptor, ModuleKind, ANDROID_PLATFORM_FU, THIRDPARTY_FU};

/// Normalized module-id prefixes classified as platform when no FU claims them.
pub const PLATFORM_MODULE_PREFIXES: &[&str] = &[
    "androidx.",
    "android.",
    "com.android.",
    "com.google.android.",
    "org.jetbrains.kotlin",
    "org.jetbrains.kotlinx",
    "org.jetbrains.annotations",
];

/// Apply include/exclude patterns and the local-module switch.
///
/// App and dynamic-feature modules are always kept: they are the artifact.
pub fn filter_modules(modules: Vec<ModuleDescriptor>, config: &SizeConfig) -> Vec<ModuleDescriptor> {
    let filter = ModuleFilter::new(&config.include_patterns, &config.exclude_patterns);
    modules
        .into_iter()
        .filter(|m| match m.kind {
            ModuleKind::AppModule { .. } | ModuleKind::DynamicFeature { .. } => true,
            ModuleKind::LocalModule { .. } => {
                config.include_local_modules && filter.should_include(&m.id)
            }
            ModuleKind::RemoteLibrary { .. } | ModuleKind::RemoteArchive { .. } => {
                filter.should_include(&m.id)
            }
        })
        .collect()
}

/// Reserved FU for a module no declared pattern claimed.
pub fn fallback_fu(normalized_id: &str) -> &'static str {
    if PLATFORM_MODULE_PREFIXES.iter().any(|p| normalized_id.starts_with(p)) {
        ANDROID_PLATFORM_FU
    } else {
        THIRDPARTY_FU
    }
}

/// Partition every module index into exactly one FU.
///
/// Declared FUs are tried in configuration order and the first one with a
/// matching pattern claims the module.
pub fn assign_functional_units(
    index: &ModuleIndex,
    mapping: &OrderedMap<Vec<String>>,
) -> FunctionalUnitMap {
    let declared: Vec<(&str, GlobSet)> =
        mapping.iter().map(|(fu, patterns)| (fu, GlobSet::new(patterns))).collect();

    let mut fus = FunctionalUnitMap::new();
    for (position, id) in index.ids().iter().enumerate() {
        let normalized = normalize_id(id);
        let fu = declared
            .iter()
            .find(|(_, globs)| globs.matches_any(&normalized))
            .map(|(fu, _)| *fu)
            .unwrap_or_else(|| fallback_fu(&normalized));
        fus.entry(fu.to_string()).or_insert_with(BTreeSet::new).insert(position as u32);
    }
    for (fu, members) in &fus {
        debug!(fu = %fu, modules = members.len(), "functional unit assigned");
    }
    fus
}

/// Bundle module name of a dynamic feature (`:features:hotels` -> `hotels`).
pub fn feature_name(id: &str) -> String {
    let normalized = normalize_id(id);
    normalized.rsplit('.').next().unwrap_or(&normalized).to_string()
}
