//! Core data model shared by mapping generation and size attribution.
//!
//! This module contains:
//! - Module descriptors handed in by the build-system adapter
//! - Per-module scan results
//! - Raw decoder entries (files and code packages)
//! - The per-FU size breakdown

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reserved FU for platform (Android / Kotlin) modules and namespaces.
pub const ANDROID_PLATFORM_FU: &str = "android_platform";

/// Reserved FU for everything not owned by the app and not platform.
pub const THIRDPARTY_FU: &str = "thirdparty";

/// Where a project module lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLocation {
    pub project_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl ProjectLocation {
    /// Location using the conventional `<project>/build` build directory.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        let build_dir = project_dir.join("build");
        Self { project_dir, build_dir }
    }
}

/// Kind of a dependency module, with the data each kind is scanned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleKind {
    /// A resolved Android library archive (`.aar`).
    RemoteLibrary { archive: PathBuf },
    /// A resolved plain jar.
    RemoteArchive { archive: PathBuf },
    LocalModule { location: ProjectLocation },
    AppModule { location: ProjectLocation },
    DynamicFeature { location: ProjectLocation },
}

impl ModuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::RemoteLibrary { .. } => "remote_library",
            ModuleKind::RemoteArchive { .. } => "remote_archive",
            ModuleKind::LocalModule { .. } => "local_module",
            ModuleKind::AppModule { .. } => "app_module",
            ModuleKind::DynamicFeature { .. } => "dynamic_feature",
        }
    }

    /// Project location for modules built from sources in this build.
    pub fn project_location(&self) -> Option<&ProjectLocation> {
        match self {
            ModuleKind::RemoteLibrary { .. } | ModuleKind::RemoteArchive { .. } => None,
            ModuleKind::LocalModule { location }
            | ModuleKind::AppModule { location }
            | ModuleKind::DynamicFeature { location } => Some(location),
        }
    }
}

/// A module as listed by the build-system adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// `group:artifact` for remote modules, `:project:path` for project modules.
    pub id: String,
    pub kind: ModuleKind,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>, kind: ModuleKind) -> Self {
        Self { id: id.into(), kind }
    }
}

/// Declared source directories of a project module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSet {
    #[serde(default)]
    pub java: Vec<PathBuf>,
    #[serde(default)]
    pub res: Vec<PathBuf>,
    #[serde(default)]
    pub assets: Vec<PathBuf>,
    #[serde(default)]
    pub jni_libs: Vec<PathBuf>,
}

impl SourceSet {
    pub fn is_empty(&self) -> bool {
        self.java.is_empty() && self.res.is_empty() && self.assets.is_empty() && self.jni_libs.is_empty()
    }
}

/// Resource counts split into the module's own and inherited resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCounts {
    pub declared: u32,
    pub transitive: u32,
    pub total: u32,
}

/// A native library shipped by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLib {
    pub abi: String,
    pub name: String,
    pub size_bytes: u64,
}

/// Everything the scanner extracted from one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedModule {
    pub id: String,
    pub kind: ModuleKind,
    pub resources: ResourceCounts,
    pub classes_by_package: BTreeMap<String, u32>,
    pub native_libs: Vec<NativeLib>,
    /// Artifact-relative paths (`res/..`, `assets/..`, `lib/..`) this module contributes.
    pub mapped_files: BTreeSet<String>,
    pub warnings: Vec<String>,
}

impl ScannedModule {
    pub fn empty(descriptor: &ModuleDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            kind: descriptor.kind.clone(),
            resources: ResourceCounts::default(),
            classes_by_package: BTreeMap::new(),
            native_libs: Vec::new(),
            mapped_files: BTreeSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Resource count used for reporting: declared when the folder walk found any.
    pub fn resource_count(&self) -> u32 {
        if self.resources.declared > 0 {
            self.resources.declared
        } else {
            self.resources.total
        }
    }

    pub fn class_count(&self) -> u32 {
        self.classes_by_package.values().sum()
    }
}

/// Size category of an artifact file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Code,
    Resources,
    Assets,
    NativeLibs,
    Other,
}

/// A file entry produced by the artifact decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFileEntry {
    pub path: String,
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_hint: Option<FileCategory>,
}

impl RawFileEntry {
    pub fn new(path: impl Into<String>, size_bytes: u64) -> Self {
        Self { path: path.into(), size_bytes, category_hint: None }
    }
}

/// A code package from the decoder's size-weighted package tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPackageEntry {
    pub package: String,
    pub depth: u32,
    /// Cumulative size including nested packages.
    pub size_bytes: u64,
}

impl RawPackageEntry {
    /// Entry whose depth is derived from the number of dotted segments.
    pub fn new(package: impl Into<String>, size_bytes: u64) -> Self {
        let package = package.into();
        let depth = package_depth(&package);
        Self { package, depth, size_bytes }
    }
}

/// Number of dotted segments; the unnamed package has depth 0.
pub fn package_depth(package: &str) -> u32 {
    if package.is_empty() || package == DEFAULT_PACKAGE {
        0
    } else {
        package.split('.').count() as u32
    }
}

/// Name used for classes without a package.
pub const DEFAULT_PACKAGE: &str = "(default)";

/// Byte breakdown for one FU (or the aggregate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobSizeBreakdown {
    pub code: u64,
    pub resources: u64,
    pub assets: u64,
    pub native_libs: u64,
    pub other: u64,
    pub total: u64,
}

impl LobSizeBreakdown {
    pub fn add(&mut self, category: FileCategory, bytes: u64) {
        match category {
            FileCategory::Code => self.code += bytes,
            FileCategory::Resources => self.resources += bytes,
            FileCategory::Assets => self.assets += bytes,
            FileCategory::NativeLibs => self.native_libs += bytes,
            FileCategory::Other => self.other += bytes,
        }
        self.total = self.code + self.resources + self.assets + self.native_libs + self.other;
    }

    pub fn merge(&mut self, other: &LobSizeBreakdown) {
        self.add(FileCategory::Code, other.code);
        self.add(FileCategory::Resources, other.resources);
        self.add(FileCategory::Assets, other.assets);
        self.add(FileCategory::NativeLibs, other.native_libs);
        self.add(FileCategory::Other, other.other);
    }
}

/// Shape of the analyzed artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Single APK; paths carry no module directory.
    Apk,
    /// App bundle; every path starts with its module directory (`base/`, `<feature>/`).
    Bundle,
}

impl ArtifactKind {
    pub fn has_module_prefixes(self) -> bool {
        matches!(self, ArtifactKind::Bundle)
    }
}
