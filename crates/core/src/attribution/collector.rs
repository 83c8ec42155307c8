use std::collections::BTreeMap;

use crossbeam::queue::SegQueue;

use crate::model::{RawFileEntry, RawPackageEntry};

/// Append-only sink for decoder output, shared by concurrent producers.
///
/// Producers only push; nothing is read until `finish` consumes the collector.
#[derive(Debug, Default)]
pub struct Collector {
    files: SegQueue<RawFileEntry>,
    packages: SegQueue<RawPackageEntry>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect_file(&self, entry: RawFileEntry) {
        self.files.push(entry);
    }

    pub fn collect_dex_packages<I>(&self, entries: I)
    where
        I: IntoIterator<Item = RawPackageEntry>,
    {
        for entry in entries {
            self.packages.push(entry);
        }
    }

    /// Drain both queues into a canonical, arrival-order independent snapshot.
    pub fn finish(self) -> CollectedEntries {
        let mut files = Vec::with_capacity(self.files.len());
        while let Some(file) = self.files.pop() {
            files.push(file);
        }
        let mut packages = Vec::with_capacity(self.packages.len());
        while let Some(package) = self.packages.pop() {
            packages.push(package);
        }
        CollectedEntries::new(files, packages)
    }
}

/// Immutable snapshot of everything collected for one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedEntries {
    files: Vec<RawFileEntry>,
    packages: Vec<RawPackageEntry>,
}

impl CollectedEntries {
    /// Sort files by path and merge package entries reported more than once
    /// (one package tree per dex file) by summing their sizes.
    pub fn new(mut files: Vec<RawFileEntry>, packages: Vec<RawPackageEntry>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path).then(a.size_bytes.cmp(&b.size_bytes)));

        let mut merged: BTreeMap<String, RawPackageEntry> = BTreeMap::new();
        for entry in packages {
            merged
                .entry(entry.package.clone())
                .and_modify(|existing| existing.size_bytes += entry.size_bytes)
                .or_insert(entry);
        }
        let mut packages: Vec<RawPackageEntry> = merged.into_values().collect();
        packages.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.package.cmp(&b.package)));

        Self { files, packages }
    }

    pub fn files(&self) -> &[RawFileEntry] {
        &self.files
    }

    /// Packages deepest first, ties by name.
    pub fn packages(&self) -> &[RawPackageEntry] {
        &self.packages
    }
}
