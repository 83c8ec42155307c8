use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::attribution::collector::{CollectedEntries, Collector};
use crate::attribution::fallback::NamespaceClassifier;
use crate::attribution::report::{
    coverage_percent, FileDetail, FileResolution, FuShare, PackageDetail, PackageResolution,
    SizeReport,
};
use crate::attribution::resolve::{candidates, category_of, file_name, is_code_container, strip_module_dir};
use crate::config::SizeConfig;
use crate::mapping::MappingTables;
use crate::model::{ArtifactKind, FileCategory, LobSizeBreakdown, RawFileEntry, RawPackageEntry, DEFAULT_PACKAGE};

/// Two-phase size attribution for one artifact.
///
/// Phase one: any number of producers call `collect_file` and
/// `collect_dex_packages` through a shared reference. Phase two: `compute`
/// consumes the engine, so it runs once and no collection can follow it.
pub struct AttributionEngine {
    tables: MappingTables,
    config: SizeConfig,
    kind: ArtifactKind,
    collector: Collector,
}

impl AttributionEngine {
    pub fn new(tables: MappingTables, config: SizeConfig, kind: ArtifactKind) -> Self {
        Self { tables, config, kind, collector: Collector::new() }
    }

    pub fn collect_file(&self, entry: RawFileEntry) {
        self.collector.collect_file(entry);
    }

    pub fn collect_dex_packages<I>(&self, entries: I)
    where
        I: IntoIterator<Item = RawPackageEntry>,
    {
        self.collector.collect_dex_packages(entries);
    }

    pub fn compute(self) -> SizeReport {
        let entries = self.collector.finish();
        Calculator::new(&self.tables, &self.config, self.kind).run(&entries)
    }
}

/// Outcome of the file pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePass {
    pub by_fu: BTreeMap<String, LobSizeBreakdown>,
    pub details: Vec<FileDetail>,
    pub unmatched_bytes: u64,
    pub ignored_bytes: u64,
    pub raw_code_bytes: u64,
    pub collisions: usize,
}

/// Outcome of the package pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagePass {
    /// Remaining (non-child) size recorded for every processed package.
    pub remaining: BTreeMap<String, u64>,
    pub code_by_fu: BTreeMap<String, u64>,
    pub unmatched_bytes: u64,
    pub details: Vec<PackageDetail>,
}

impl PackagePass {
    pub fn package_total(&self) -> u64 {
        self.code_by_fu.values().sum::<u64>() + self.unmatched_bytes
    }
}

/// Deterministic, single-threaded compute phase over a collected snapshot.
pub struct Calculator<'a> {
    tables: &'a MappingTables,
    config: &'a SizeConfig,
    kind: ArtifactKind,
    classifier: NamespaceClassifier,
    fu_by_module: BTreeMap<u32, &'a str>,
}

impl<'a> Calculator<'a> {
    pub fn new(tables: &'a MappingTables, config: &'a SizeConfig, kind: ArtifactKind) -> Self {
        Self {
            tables,
            config,
            kind,
            classifier: NamespaceClassifier::new(&config.app_package_prefixes),
            fu_by_module: tables.metadata.fu_by_module(),
        }
    }

    pub fn run(&self, entries: &CollectedEntries) -> SizeReport {
        let files = self.file_pass(entries.files());
        let mut packages = self.package_pass(entries.packages());
        let dex_scale = normalize_code(&mut packages, files.raw_code_bytes);

        let mut functional_units = files.by_fu.clone();
        for (fu, bytes) in &packages.code_by_fu {
            functional_units.entry(fu.clone()).or_default().add(FileCategory::Code, *bytes);
        }
        let mut total = LobSizeBreakdown::default();
        for breakdown in functional_units.values() {
            total.merge(breakdown);
        }

        let explained_code = packages.package_total();
        let code_overhead_bytes = files.raw_code_bytes.saturating_sub(explained_code);
        let coverage = coverage_percent(total.total, files.unmatched_bytes + packages.unmatched_bytes);

        info!(
            functional_units = functional_units.len(),
            attributed = total.total,
            unmatched_files = files.unmatched_bytes,
            unmatched_code = packages.unmatched_bytes,
            code_overhead = code_overhead_bytes,
            coverage,
            "computed size attribution"
        );

        SizeReport {
            artifact_kind: self.kind,
            variant: self.tables.metadata.variant.clone(),
            functional_units,
            total,
            unmatched_file_bytes: files.unmatched_bytes,
            unmatched_code_bytes: packages.unmatched_bytes,
            ignored_file_bytes: files.ignored_bytes,
            raw_code_bytes: files.raw_code_bytes,
            code_overhead_bytes,
            dex_scale,
            coverage_percent: coverage,
            collisions: files.collisions,
            files: files.details,
            packages: packages.details,
        }
    }

    /// Attribute every non-code, non-ignored file.
    pub fn file_pass(&self, files: &[RawFileEntry]) -> FilePass {
        let mut pass = FilePass::default();
        for file in files {
            if is_code_container(&file.path, self.kind) {
                pass.raw_code_bytes += file.size_bytes;
                continue;
            }
            let name = file_name(&file.path);
            if self.config.ignored_file_names.iter().any(|ignored| ignored == name) {
                pass.ignored_bytes += file.size_bytes;
                continue;
            }

            let category = file.category_hint.unwrap_or_else(|| category_of(&file.path, self.kind));
            let mut detail = FileDetail {
                path: file.path.clone(),
                size_bytes: file.size_bytes,
                category,
                fu: None,
                resolution: FileResolution::Unmatched,
                colliding_modules: Vec::new(),
            };

            if let Some((fu, resolution, indices)) = self.resolve_file(&file.path) {
                if indices.iter().filter(|i| **i >= 0).count() > 1 {
                    pass.collisions += 1;
                    detail.colliding_modules = indices.to_vec();
                }
                detail.fu = Some(fu.to_string());
                detail.resolution = resolution;
            } else if let Some(fu) =
                self.classifier.classify_file(strip_module_dir(&file.path, self.kind))
            {
                detail.fu = Some(fu.to_string());
                detail.resolution = FileResolution::Fallback;
            }

            match &detail.fu {
                Some(fu) => pass.by_fu.entry(fu.clone()).or_default().add(category, file.size_bytes),
                None => pass.unmatched_bytes += file.size_bytes,
            }
            pass.details.push(detail);
        }
        pass.details.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.path.cmp(&b.path)));
        debug!(
            files = pass.details.len(),
            unmatched = pass.unmatched_bytes,
            raw_code = pass.raw_code_bytes,
            "file pass done"
        );
        pass
    }

    /// First candidate key present in the resource mapping whose owner resolves to an FU.
    fn resolve_file(&self, path: &str) -> Option<(&str, FileResolution, &[i32])> {
        for candidate in candidates(path, self.kind) {
            let Some(indices) = self.tables.resources.resource_mapping.get(&candidate.key) else {
                continue;
            };
            if let Some(fu) = indices.first().and_then(|i| self.fu_for_index(*i)) {
                let resolution = FileResolution::Mapped {
                    transform: candidate.transform,
                    base_prefixed: candidate.base_prefixed,
                };
                return Some((fu, resolution, indices.as_slice()));
            }
        }
        None
    }

    fn fu_for_index(&self, index: i32) -> Option<&'a str> {
        if index < 0 {
            self.tables.resources.fu_index.get(&index).map(String::as_str)
        } else {
            self.fu_by_module.get(&(index as u32)).copied()
        }
    }

    /// Attribute code packages deepest first, deduplicating nested sizes.
    pub fn package_pass(&self, packages: &[RawPackageEntry]) -> PackagePass {
        let mut ordered: Vec<&RawPackageEntry> = packages.iter().collect();
        ordered.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.package.cmp(&b.package)));

        let mut pass = PackagePass::default();
        for entry in ordered {
            let child_sum = descendant_sum(&pass.remaining, &entry.package);
            let remaining = entry.size_bytes.saturating_sub(child_sum);
            pass.remaining.insert(entry.package.clone(), remaining);
            if remaining == 0 {
                continue;
            }

            let mut detail = PackageDetail {
                package: entry.package.clone(),
                size_bytes: remaining,
                resolution: PackageResolution::Unmatched,
                shares: Vec::new(),
            };
            if let Some((matched, mapping)) = self.lookup_package(&entry.package) {
                detail.resolution = if matched == entry.package {
                    PackageResolution::Exact
                } else {
                    PackageResolution::Ancestor { package: matched.to_string() }
                };
                detail.shares = self.split_by_class_count(remaining, mapping);
            } else if let Some(fu) = self.classifier.classify(&entry.package) {
                detail.resolution = PackageResolution::Fallback;
                detail.shares = vec![FuShare { fu: fu.to_string(), bytes: remaining }];
            }

            if detail.shares.is_empty() {
                pass.unmatched_bytes += remaining;
            }
            for share in &detail.shares {
                *pass.code_by_fu.entry(share.fu.clone()).or_insert(0) += share.bytes;
            }
            pass.details.push(detail);
        }
        pass.details.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes).then_with(|| a.package.cmp(&b.package)));
        debug!(
            packages = pass.details.len(),
            unmatched = pass.unmatched_bytes,
            "package pass done"
        );
        pass
    }

    /// Walk the package and its dotted prefixes until one is mapped.
    fn lookup_package(&self, package: &str) -> Option<(&'a str, &'a [(i32, u32)])> {
        let mapping = &self.tables.packages.package_mapping;
        let mut current = package;
        loop {
            if let Some((key, entries)) = mapping.get_key_value(current) {
                return Some((key.as_str(), entries.as_slice()));
            }
            if current == DEFAULT_PACKAGE {
                return None;
            }
            current = current.rsplit_once('.')?.0;
        }
    }

    /// Split `bytes` across mapping entries weighted by class count.
    ///
    /// Largest-remainder rounding keeps the parts summing to exactly `bytes`.
    fn split_by_class_count(&self, bytes: u64, mapping: &[(i32, u32)]) -> Vec<FuShare> {
        let resolved: Vec<(&str, u64)> = mapping
            .iter()
            .filter_map(|(index, count)| self.fu_for_index(*index).map(|fu| (fu, u64::from(*count))))
            .collect();
        if resolved.is_empty() {
            return Vec::new();
        }
        let weights: Vec<u64> = if resolved.iter().all(|(_, w)| *w == 0) {
            vec![1; resolved.len()]
        } else {
            resolved.iter().map(|(_, w)| *w).collect()
        };

        let mut by_fu: BTreeMap<&str, u64> = BTreeMap::new();
        for ((fu, _), part) in resolved.iter().zip(largest_remainder(bytes, &weights)) {
            *by_fu.entry(*fu).or_insert(0) += part;
        }
        by_fu
            .into_iter()
            .filter(|(_, bytes)| *bytes > 0)
            .map(|(fu, bytes)| FuShare { fu: fu.to_string(), bytes })
            .collect()
    }
}

/// Sum of sizes recorded for strict dotted descendants of `package`.
fn descendant_sum(recorded: &BTreeMap<String, u64>, package: &str) -> u64 {
    if package == DEFAULT_PACKAGE {
        return 0;
    }
    // '/' sorts right after '.', so this range holds exactly the "<package>." keys.
    let start = format!("{package}.");
    let end = format!("{package}/");
    recorded.range(start..end).map(|(_, size)| *size).sum()
}

/// Distribute `total` proportionally to `weights`, summing exactly to `total`.
///
/// Ties in the remainder go to the earlier entry.
pub fn largest_remainder(total: u64, weights: &[u64]) -> Vec<u64> {
    let weight_sum: u128 = weights.iter().map(|w| u128::from(*w)).sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }
    let mut parts = Vec::with_capacity(weights.len());
    let mut remainders = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let exact = u128::from(total) * u128::from(*w);
        parts.push((exact / weight_sum) as u64);
        remainders.push((exact % weight_sum, i));
    }
    let assigned: u64 = parts.iter().sum();
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, i) in remainders.into_iter().take((total - assigned) as usize) {
        parts[i] += 1;
    }
    parts
}

/// Scale package-level code down to the raw code budget when it overshoots.
///
/// FU totals and the unmatched total are rescaled with largest-remainder
/// rounding so they reconcile exactly with the budget; detail rows are
/// rounded independently and may drift by a few bytes.
fn normalize_code(pass: &mut PackagePass, raw_budget: u64) -> Option<f64> {
    let package_total = pass.package_total();
    if raw_budget == 0 || package_total <= raw_budget {
        return None;
    }
    let ratio = raw_budget as f64 / package_total as f64;

    let mut weights: Vec<u64> = pass.code_by_fu.values().copied().collect();
    weights.push(pass.unmatched_bytes);
    let scaled = largest_remainder(raw_budget, &weights);
    for (bytes, new_bytes) in pass.code_by_fu.values_mut().zip(scaled.iter()) {
        *bytes = *new_bytes;
    }
    pass.unmatched_bytes = scaled.last().copied().unwrap_or(0);

    let scale = |bytes: u64| (bytes as f64 * ratio).round() as u64;
    for detail in &mut pass.details {
        detail.size_bytes = scale(detail.size_bytes);
        for share in &mut detail.shares {
            share.bytes = scale(share.bytes);
        }
    }
    info!(raw_budget, package_total, ratio, "scaled package code to raw code size");
    Some(ratio)
}
