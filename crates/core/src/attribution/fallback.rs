//! Namespace-based classification for files and packages with no mapping.

use crate::mapping::emitter::is_same_or_descendant;
use crate::model::{ANDROID_PLATFORM_FU, THIRDPARTY_FU};

/// Namespace roots shipped by the Android platform, its support libraries, or the Kotlin runtime.
pub const PLATFORM_NAMESPACES: &[&str] = &[
    "android",
    "androidx",
    "com.android",
    "com.google.android",
    "dalvik",
    "java",
    "javax",
    "kotlin",
    "kotlinx",
    "org.intellij.lang.annotations",
    "org.jetbrains.annotations",
];

/// Classifies unmapped namespaces into `android_platform` or `thirdparty`.
#[derive(Debug, Clone, Default)]
pub struct NamespaceClassifier {
    app_prefixes: Vec<String>,
}

impl NamespaceClassifier {
    pub fn new(app_prefixes: &[String]) -> Self {
        let app_prefixes = app_prefixes
            .iter()
            .map(|p| p.trim().trim_end_matches(".*").trim_end_matches('.').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self { app_prefixes }
    }

    /// Reserved FU for `namespace`, or `None` when it cannot be decided.
    ///
    /// Without configured app prefixes only platform namespaces are decidable.
    pub fn classify(&self, namespace: &str) -> Option<&'static str> {
        if PLATFORM_NAMESPACES.iter().any(|root| is_same_or_descendant(namespace, root)) {
            return Some(ANDROID_PLATFORM_FU);
        }
        if !self.app_prefixes.is_empty()
            && !self.app_prefixes.iter().any(|p| is_same_or_descendant(namespace, p))
        {
            return Some(THIRDPARTY_FU);
        }
        None
    }

    /// Classify a file path (module directory already removed) by its namespace.
    pub fn classify_file(&self, inner_path: &str) -> Option<&'static str> {
        file_namespace(inner_path).and_then(|ns| self.classify(&ns))
    }
}

/// Namespace implied by a non-resource file path.
///
/// - `META-INF/<group>_<artifact>.version` and `.kotlin_module` markers name their library.
/// - Java resources (`okhttp3/internal/publicsuffix/x.gz`, bundle `root/...`) use their directory.
/// - Resources, assets, native libraries, and root-level files have no namespace.
pub fn file_namespace(inner_path: &str) -> Option<String> {
    let path = inner_path.strip_prefix("root/").unwrap_or(inner_path);
    if let Some(marker) = path.strip_prefix("META-INF/") {
        if marker.contains('/') {
            return None;
        }
        let stem = marker.strip_suffix(".version").or_else(|| marker.strip_suffix(".kotlin_module"))?;
        return (!stem.is_empty()).then(|| stem.replace('_', "."));
    }
    let (dir, _) = path.rsplit_once('/')?;
    let top = dir.split('/').next().unwrap_or(dir);
    if matches!(top, "res" | "assets" | "lib" | "dex" | "manifest" | "META-INF") || dir.is_empty() {
        return None;
    }
    Some(dir.replace('/', "."))
}
