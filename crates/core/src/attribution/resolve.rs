//! Artifact path normalization for resource-mapping lookups.

use serde::{Deserialize, Serialize};

use crate::mapping::BASE_MODULE_DIR;
use crate::model::{ArtifactKind, FileCategory};

/// How a lookup key was derived from the artifact path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTransform {
    Literal,
    /// Resource compilers add implicit `-v<N>` qualifiers (`drawable-anydpi-v21`).
    VersionQualifierStripped,
    /// Inline animated-vector frames are extracted as `$<parent>__<n>.xml`.
    AnimatedFrame,
}

/// A candidate lookup key, in resolution priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub transform: PathTransform,
    pub base_prefixed: bool,
}

pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `classes*.dex` at the APK root, or `<module>/dex/classes*.dex` in a bundle.
pub fn is_code_container(path: &str, kind: ArtifactKind) -> bool {
    let name = if kind.has_module_prefixes() {
        match path.split('/').collect::<Vec<_>>().as_slice() {
            [_, "dex", name] => *name,
            _ => return false,
        }
    } else if path.contains('/') {
        return false;
    } else {
        path
    };
    match name.strip_prefix("classes").and_then(|rest| rest.strip_suffix(".dex")) {
        Some(n) => n.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Path without the bundle module directory.
pub fn strip_module_dir(path: &str, kind: ArtifactKind) -> &str {
    if kind.has_module_prefixes() {
        path.split_once('/').map(|(_, rest)| rest).unwrap_or(path)
    } else {
        path
    }
}

/// Category derived from the path's top-level directory.
pub fn category_of(path: &str, kind: ArtifactKind) -> FileCategory {
    if is_code_container(path, kind) {
        return FileCategory::Code;
    }
    let inner = strip_module_dir(path, kind);
    match inner.split('/').next().unwrap_or(inner) {
        "res" => FileCategory::Resources,
        "assets" => FileCategory::Assets,
        "lib" => FileCategory::NativeLibs,
        "dex" => FileCategory::Code,
        _ => FileCategory::Other,
    }
}

/// Drop `-v<N>` parts from the qualifier of a `res/<qualifier>/<file>` path.
pub fn strip_version_qualifier(path: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    let res_pos = segments.iter().rposition(|s| *s == "res")?;
    if res_pos + 3 != segments.len() {
        return None;
    }
    let qualifier = segments[res_pos + 1];
    let kept: Vec<&str> = qualifier.split('-').filter(|part| !is_version_qualifier(part)).collect();
    let stripped = kept.join("-");
    if stripped == qualifier || stripped.is_empty() {
        return None;
    }
    let mut out: Vec<&str> = segments[..=res_pos].to_vec();
    out.push(&stripped);
    out.push(segments[res_pos + 2]);
    Some(out.join("/"))
}

fn is_version_qualifier(part: &str) -> bool {
    part.len() > 1 && part.starts_with('v') && part[1..].chars().all(|c| c.is_ascii_digit())
}

/// Remap `res/<q>/$<parent>__<n>.xml` to `res/<q>/<parent>.xml`.
pub fn remap_animated_frame(path: &str) -> Option<String> {
    let (dir, name) = path.rsplit_once('/')?;
    let stem = name.strip_prefix('$')?.strip_suffix(".xml")?;
    let (parent, frame) = stem.rsplit_once("__")?;
    if parent.is_empty() || frame.is_empty() || !frame.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{dir}/{parent}.xml"))
}

/// Lookup keys for `path` in priority order; the first mapped key wins.
pub fn candidates(path: &str, kind: ArtifactKind) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(6);
    push_transforms(&mut out, path.to_string(), false);
    if !kind.has_module_prefixes() {
        push_transforms(&mut out, format!("{BASE_MODULE_DIR}/{path}"), true);
    }
    out
}

fn push_transforms(out: &mut Vec<Candidate>, path: String, base_prefixed: bool) {
    let stripped = strip_version_qualifier(&path);
    let frame = remap_animated_frame(stripped.as_deref().unwrap_or(&path));
    out.push(Candidate { key: path, transform: PathTransform::Literal, base_prefixed });
    if let Some(key) = stripped {
        out.push(Candidate { key, transform: PathTransform::VersionQualifierStripped, base_prefixed });
    }
    if let Some(key) = frame {
        out.push(Candidate { key, transform: PathTransform::AnimatedFrame, base_prefixed });
    }
}
