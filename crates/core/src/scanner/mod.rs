//! Per-module extraction of resources, assets, classes, and native libraries.
//!
//! Every module is an independent unit of failure: problems reading one
//! module become entries in its `warnings` and never abort the scan of others.

pub mod classes;
pub mod native_libs;
pub mod resources;
pub mod zip;

use std::collections::{BTreeMap, BTreeSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::model::{ModuleDescriptor, ModuleKind, NativeLib, ProjectLocation, ScannedModule, SourceSet};
use crate::scanner::resources::{parse_symbol_list, resource_counts, resource_file, SymbolList};
use crate::scanner::zip::{ZipArchive, ZipError};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error("nested archive {name}: {source}")]
    NestedArchive {
        name: String,
        #[source]
        source: ZipError,
    },
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        ScanError::Io { path: path.to_path_buf(), source }
    }
}

/// All regular files below `root`, sorted. A missing root yields nothing.
pub fn walk_files(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut files = Vec::new();
    walk(root, &mut |path, is_dir| {
        if !is_dir {
            files.push(path.to_path_buf());
        }
    })?;
    files.sort();
    Ok(files)
}

/// `root` and every directory below it, sorted. A missing root yields nothing.
pub fn walk_dirs(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut dirs = Vec::new();
    if root.is_dir() {
        dirs.push(root.to_path_buf());
    }
    walk(root, &mut |path, is_dir| {
        if is_dir {
            dirs.push(path.to_path_buf());
        }
    })?;
    dirs.sort();
    Ok(dirs)
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path, bool)) -> Result<(), ScanError> {
    if !dir.is_dir() {
        return Ok(());
    }
    let read = std::fs::read_dir(dir).map_err(|source| ScanError::io(dir, source))?;
    for entry in read {
        let entry = entry.map_err(|source| ScanError::io(dir, source))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| ScanError::io(&path, source))?;
        if file_type.is_dir() {
            visit(&path, true);
            walk(&path, visit)?;
        } else if file_type.is_file() {
            visit(&path, false);
        }
    }
    Ok(())
}

/// `file` relative to `root` with forward slashes.
pub fn relative_slash_path(root: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(root).ok()?;
    let parts: Vec<String> =
        rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Conventional source directories used when the adapter declares none.
pub fn conventional_source_set(project_dir: &Path) -> SourceSet {
    let main = project_dir.join("src").join("main");
    SourceSet {
        java: vec![main.join("java"), main.join("kotlin")],
        res: vec![main.join("res")],
        assets: vec![main.join("assets")],
        jni_libs: vec![main.join("jniLibs")],
    }
}

/// Extracts a `ScannedModule` from a module's archive or project directories.
#[derive(Debug, Clone)]
pub struct ArchiveScanner {
    variant: String,
}

impl ArchiveScanner {
    pub fn new(variant: impl Into<String>) -> Self {
        Self { variant: variant.into() }
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Scan one module. Never fails: problems are recorded as warnings.
    pub fn scan(&self, descriptor: &ModuleDescriptor, sources: &SourceSet) -> ScannedModule {
        let result = catch_unwind(AssertUnwindSafe(|| self.scan_inner(descriptor, sources)));
        let module = match result {
            Ok(module) => module,
            Err(_) => {
                let mut module = ScannedModule::empty(descriptor);
                module.warnings.push("scanner panicked; module left empty".to_string());
                module
            }
        };
        for warning in &module.warnings {
            warn!(module = %module.id, %warning, "module scan warning");
        }
        debug!(
            module = %module.id,
            kind = module.kind.label(),
            packages = module.classes_by_package.len(),
            classes = module.class_count(),
            resources = module.resource_count(),
            files = module.mapped_files.len(),
            "scanned module"
        );
        module
    }

    fn scan_inner(&self, descriptor: &ModuleDescriptor, sources: &SourceSet) -> ScannedModule {
        let mut module = ScannedModule::empty(descriptor);
        match &descriptor.kind {
            ModuleKind::RemoteLibrary { archive } => self.scan_library(archive, &mut module),
            ModuleKind::RemoteArchive { archive } => self.scan_jar(archive, &mut module),
            ModuleKind::LocalModule { location }
            | ModuleKind::AppModule { location }
            | ModuleKind::DynamicFeature { location } => {
                let fallback;
                let sources = if sources.is_empty() {
                    fallback = conventional_source_set(&location.project_dir);
                    &fallback
                } else {
                    sources
                };
                self.scan_project(location, sources, &mut module)
            }
        }
        module
    }

    fn scan_library(&self, path: &Path, module: &mut ScannedModule) {
        let aar = match ZipArchive::open(path) {
            Ok(aar) => aar,
            Err(err) => {
                module.warnings.push(format!("cannot read library archive {}: {err}", path.display()));
                return;
            }
        };

        let symbols = match aar.find("R.txt") {
            Some(entry) => match aar.read(entry) {
                Ok(bytes) => Some(parse_symbol_list(&String::from_utf8_lossy(&bytes))),
                Err(err) => {
                    module.warnings.push(format!("cannot read R.txt: {err}"));
                    None
                }
            },
            None => None,
        };
        let mut declared = BTreeSet::new();
        for entry in aar.entries().iter().filter(|e| !e.is_dir()) {
            if let Some(rel) = entry.name.strip_prefix("res/") {
                if let Some(res) = resource_file(rel) {
                    declared.insert(res.key);
                    module.mapped_files.insert(res.mapped_path);
                }
            } else if entry.name.starts_with("assets/") {
                module.mapped_files.insert(entry.name.clone());
            } else if let Some((abi, name)) = native_libs::archive_native_lib(&entry.name) {
                module.native_libs.push(NativeLib {
                    abi: abi.to_string(),
                    name: name.to_string(),
                    size_bytes: entry.uncompressed_size,
                });
            }
        }
        record_resources(module, symbols.as_ref(), &declared);

        for err in classes::count_library_classes(&aar, &mut module.classes_by_package) {
            module.warnings.push(format!("cannot read classes: {err}"));
        }
        finish_native_libs(module);
    }

    fn scan_jar(&self, path: &Path, module: &mut ScannedModule) {
        match ZipArchive::open(path) {
            Ok(jar) => classes::count_jar_classes(&jar, &mut module.classes_by_package),
            Err(err) => module.warnings.push(format!("cannot read jar {}: {err}", path.display())),
        }
    }

    fn scan_project(&self, location: &ProjectLocation, sources: &SourceSet, module: &mut ScannedModule) {
        let symbols = match self.find_symbol_list(&location.build_dir) {
            Ok(Some(path)) => match std::fs::read_to_string(&path) {
                Ok(text) => Some(parse_symbol_list(&text)),
                Err(err) => {
                    module.warnings.push(format!("cannot read {}: {err}", path.display()));
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                module.warnings.push(format!("cannot search symbol lists: {err}"));
                None
            }
        };

        let mut declared = BTreeSet::new();
        for res_dir in &sources.res {
            let result = walk_files(res_dir).map(|files| {
                for file in files {
                    let Some(rel) = relative_slash_path(res_dir, &file) else { continue };
                    if let Some(res) = resource_file(&rel) {
                        declared.insert(res.key);
                        module.mapped_files.insert(res.mapped_path);
                    }
                }
            });
            if let Err(err) = result {
                module.warnings.push(format!("cannot walk resources: {err}"));
            }
        }
        record_resources(module, symbols.as_ref(), &declared);

        for assets_dir in &sources.assets {
            let result = walk_files(assets_dir).map(|files| {
                for file in files {
                    if let Some(rel) = relative_slash_path(assets_dir, &file) {
                        module.mapped_files.insert(format!("assets/{rel}"));
                    }
                }
            });
            if let Err(err) = result {
                module.warnings.push(format!("cannot walk assets: {err}"));
            }
        }

        self.scan_project_classes(location, sources, module);

        let mut native_roots: Vec<PathBuf> = sources.jni_libs.clone();
        native_roots.extend(native_libs::intermediate_native_roots(&location.build_dir, &self.variant));
        for root in &native_roots {
            if let Err(err) = native_libs::collect_abi_dirs(root, &mut module.native_libs) {
                module.warnings.push(format!("cannot walk native libraries: {err}"));
            }
        }
        finish_native_libs(module);
    }

    fn scan_project_classes(
        &self,
        location: &ProjectLocation,
        sources: &SourceSet,
        module: &mut ScannedModule,
    ) {
        let mut compiled = BTreeMap::new();
        match classes::project_class_jars(&location.project_dir, &location.build_dir, &self.variant) {
            Ok(jars) => {
                for path in jars {
                    match ZipArchive::open(&path) {
                        Ok(jar) => classes::count_jar_classes(&jar, &mut compiled),
                        Err(err) => module.warnings.push(format!("cannot read jar {}: {err}", path.display())),
                    }
                }
            }
            Err(err) => module.warnings.push(format!("cannot search class jars: {err}")),
        }
        for root in classes::compiled_class_roots(&location.build_dir, &self.variant) {
            if let Err(err) = classes::count_dir_classes(&root, &mut compiled) {
                module.warnings.push(format!("cannot walk compiled classes: {err}"));
            }
        }

        let mut from_sources = BTreeMap::new();
        for java_dir in &sources.java {
            if let Err(err) = classes::count_dir_sources(java_dir, &mut from_sources) {
                module.warnings.push(format!("cannot walk sources: {err}"));
            }
        }

        if compiled.is_empty() && !from_sources.is_empty() {
            module.warnings.push("no compiled classes found; package inventory derived from sources".to_string());
        }
        let supplemented = classes::supplement_from_sources(&mut compiled, from_sources);
        if supplemented > 0 {
            module.warnings.push(format!("{supplemented} package(s) supplemented from sources"));
        }
        module.classes_by_package = compiled;
    }

    /// First `R.txt` under the variant's symbol-list intermediates.
    fn find_symbol_list(&self, build_dir: &Path) -> Result<Option<PathBuf>, ScanError> {
        for kind in ["runtime_symbol_list", "compile_symbol_list", "symbol_list"] {
            let root = build_dir.join("intermediates").join(kind).join(&self.variant);
            let found = walk_files(&root)?
                .into_iter()
                .find(|p| p.file_name().and_then(|n| n.to_str()) == Some("R.txt"));
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }
}

fn record_resources(module: &mut ScannedModule, symbols: Option<&SymbolList>, declared: &BTreeSet<String>) {
    if let Some(list) = symbols {
        if list.malformed_lines > 0 {
            module.warnings.push(format!("R.txt has {} malformed line(s)", list.malformed_lines));
        }
    }
    module.resources = resource_counts(symbols, declared);
}

fn finish_native_libs(module: &mut ScannedModule) {
    let libs = std::mem::take(&mut module.native_libs);
    module.native_libs = native_libs::dedup_native_libs(libs);
    for lib in &module.native_libs {
        module.mapped_files.insert(format!("lib/{}/{}", lib.abi, lib.name));
    }
}
