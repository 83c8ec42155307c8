//! Native library discovery (`jni/<abi>/*.so` and ABI-named directories).

use std::path::{Path, PathBuf};

use crate::model::NativeLib;
use crate::scanner::{walk_dirs, ScanError};

pub const KNOWN_ABIS: &[&str] =
    &["armeabi", "armeabi-v7a", "arm64-v8a", "x86", "x86_64", "mips", "mips64", "riscv64"];

pub fn is_abi(name: &str) -> bool {
    KNOWN_ABIS.contains(&name)
}

/// `(abi, file name)` of a `jni/<abi>/<name>.so` archive entry.
pub fn archive_native_lib(entry_name: &str) -> Option<(&str, &str)> {
    let rest = entry_name.strip_prefix("jni/")?;
    let (abi, file) = rest.split_once('/')?;
    if file.contains('/') || !file.ends_with(".so") || !is_abi(abi) {
        return None;
    }
    Some((abi, file))
}

/// Intermediate directories AGP writes native libraries to.
pub fn intermediate_native_roots(build_dir: &Path, variant: &str) -> Vec<PathBuf> {
    ["library_jni", "merged_jni_libs", "stripped_native_libs"]
        .iter()
        .map(|kind| build_dir.join("intermediates").join(kind).join(variant))
        .collect()
}

/// Collect `.so` files sitting directly in ABI-named directories below `root`.
pub fn collect_abi_dirs(root: &Path, out: &mut Vec<NativeLib>) -> Result<(), ScanError> {
    for dir in walk_dirs(root)? {
        let Some(abi) = dir.file_name().and_then(|n| n.to_str()) else { continue };
        if !is_abi(abi) {
            continue;
        }
        let read = std::fs::read_dir(&dir).map_err(|source| ScanError::io(&dir, source))?;
        let mut found = Vec::new();
        for entry in read {
            let entry = entry.map_err(|source| ScanError::io(&dir, source))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !name.ends_with(".so") {
                continue;
            }
            let meta = entry.metadata().map_err(|source| ScanError::io(&path, source))?;
            if meta.is_file() {
                found.push(NativeLib { abi: abi.to_string(), name: name.to_string(), size_bytes: meta.len() });
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        out.extend(found);
    }
    Ok(())
}

/// Drop repeated `(abi, name)` pairs, keeping the first occurrence.
pub fn dedup_native_libs(libs: Vec<NativeLib>) -> Vec<NativeLib> {
    let mut seen = std::collections::HashSet::new();
    libs.into_iter().filter(|lib| seen.insert((lib.abi.clone(), lib.name.clone()))).collect()
}
