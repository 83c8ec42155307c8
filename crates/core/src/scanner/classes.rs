//! Class and package inventory from jars, compiled output, and sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::model::DEFAULT_PACKAGE;
use crate::scanner::zip::{ZipArchive, ZipEntry};
use crate::scanner::{relative_slash_path, walk_files, ScanError};

/// Package of a `.class` entry path (`com/acme/Foo$Bar.class` -> `com.acme`).
pub fn class_package(path: &str) -> Option<String> {
    package_for(path, &[".class"]).filter(|_| {
        let file = path.rsplit('/').next().unwrap_or(path);
        file != "module-info.class" && file != "package-info.class"
    })
}

/// Package of a source file, by directory (`com/acme/Foo.kt` -> `com.acme`).
pub fn source_package(path: &str) -> Option<String> {
    package_for(path, &[".java", ".kt"])
}

fn package_for(path: &str, extensions: &[&str]) -> Option<String> {
    let path = path.trim_start_matches('/');
    if !extensions.iter().any(|ext| path.ends_with(ext)) || path.starts_with("META-INF/") {
        return None;
    }
    Some(match path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.replace('/', "."),
        _ => DEFAULT_PACKAGE.to_string(),
    })
}

/// Count `.class` entries of a jar per package.
pub fn count_jar_classes(jar: &ZipArchive, into: &mut BTreeMap<String, u32>) {
    for entry in jar.entries().iter().filter(|e| !e.is_dir()) {
        if let Some(package) = class_package(&entry.name) {
            *into.entry(package).or_insert(0) += 1;
        }
    }
}

/// Jars inside a library archive that carry code: `classes.jar`,
/// `classes<N>.jar`, and `libs/*.jar`.
pub fn library_code_jars(aar: &ZipArchive) -> Vec<&ZipEntry> {
    aar.entries().iter().filter(|e| is_library_code_jar(&e.name)).collect()
}

fn is_library_code_jar(name: &str) -> bool {
    if let Some(lib) = name.strip_prefix("libs/") {
        return lib.ends_with(".jar") && !lib.contains('/');
    }
    match name.strip_prefix("classes").and_then(|rest| rest.strip_suffix(".jar")) {
        Some(n) => n.is_empty() || n.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Count classes of every code jar nested in a library archive.
///
/// Jars are independent: one unreadable jar is reported and the rest are
/// still counted.
pub fn count_library_classes(aar: &ZipArchive, into: &mut BTreeMap<String, u32>) -> Vec<ScanError> {
    let mut failures = Vec::new();
    for entry in library_code_jars(aar) {
        let jar = aar
            .read(entry)
            .and_then(ZipArchive::from_bytes)
            .map_err(|source| ScanError::NestedArchive { name: entry.name.clone(), source });
        match jar {
            Ok(jar) => count_jar_classes(&jar, into),
            Err(err) => failures.push(err),
        }
    }
    failures
}

/// Compiled-class jars of a project module: `libs/*.jar` next to the build
/// file, then `classes.jar`/`classes<N>.jar` under the variant's
/// `runtime_library_classes_jar` intermediates.
pub fn project_class_jars(project_dir: &Path, build_dir: &Path, variant: &str) -> Result<Vec<PathBuf>, ScanError> {
    let libs = project_dir.join("libs");
    let mut jars: Vec<PathBuf> = walk_files(&libs)?
        .into_iter()
        .filter(|p| p.parent() == Some(libs.as_path()) && p.extension().is_some_and(|e| e == "jar"))
        .collect();
    let intermediates = build_dir.join("intermediates/runtime_library_classes_jar").join(variant);
    jars.extend(walk_files(&intermediates)?.into_iter().filter(|p| {
        p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("classes") && is_library_code_jar(n))
    }));
    Ok(jars)
}

/// Count `.class` files below a compiled-output root.
pub fn count_dir_classes(root: &Path, into: &mut BTreeMap<String, u32>) -> Result<(), ScanError> {
    count_dir(root, into, class_package)
}

/// Count `.java`/`.kt` files below a source root.
pub fn count_dir_sources(root: &Path, into: &mut BTreeMap<String, u32>) -> Result<(), ScanError> {
    count_dir(root, into, source_package)
}

fn count_dir(
    root: &Path,
    into: &mut BTreeMap<String, u32>,
    package_of: fn(&str) -> Option<String>,
) -> Result<(), ScanError> {
    for file in walk_files(root)? {
        let Some(rel) = relative_slash_path(root, &file) else { continue };
        if let Some(package) = package_of(&rel) {
            *into.entry(package).or_insert(0) += 1;
        }
    }
    Ok(())
}

/// Add source-derived packages that have no compiled counterpart.
///
/// Returns how many packages were supplemented.
pub fn supplement_from_sources(
    compiled: &mut BTreeMap<String, u32>,
    sources: BTreeMap<String, u32>,
) -> usize {
    let mut added = 0;
    for (package, count) in sources {
        if !compiled.contains_key(&package) {
            compiled.insert(package, count);
            added += 1;
        }
    }
    added
}

/// Capitalize a variant name the way task names embed it (`release` -> `Release`).
pub fn capitalized(variant: &str) -> String {
    let mut chars = variant.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Compiled-class output roots of a project module, relative to its build dir.
pub fn compiled_class_roots(build_dir: &Path, variant: &str) -> Vec<PathBuf> {
    let cap = capitalized(variant);
    vec![
        build_dir.join("intermediates/javac").join(variant).join("classes"),
        build_dir
            .join("intermediates/javac")
            .join(variant)
            .join(format!("compile{cap}JavaWithJavac"))
            .join("classes"),
        build_dir.join("tmp/kotlin-classes").join(variant),
        build_dir
            .join("intermediates/built_in_kotlinc")
            .join(variant)
            .join(format!("compile{cap}Kotlin"))
            .join("classes"),
    ]
}
