//! Resource inventory: symbol lists and `res/<qualifier>/<file>` walks.

use std::collections::BTreeSet;

use crate::model::ResourceCounts;

/// Unique resources parsed from an `R.txt` symbol list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolList {
    /// `type:name` keys.
    pub keys: BTreeSet<String>,
    pub malformed_lines: usize,
}

impl SymbolList {
    pub fn total(&self) -> u32 {
        self.keys.len() as u32
    }
}

/// Parse `kind type name value...` lines, deduplicating by `type:name`.
pub fn parse_symbol_list(text: &str) -> SymbolList {
    let mut list = SymbolList::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(_kind), Some(ty), Some(name)) => {
                list.keys.insert(format!("{ty}:{name}"));
            }
            _ => list.malformed_lines += 1,
        }
    }
    list
}

/// A file-backed resource found by a folder walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    /// `type:name` key, comparable with symbol list keys.
    pub key: String,
    /// Artifact-relative path, `res/<qualifier>/<file>`.
    pub mapped_path: String,
}

/// Classify a path relative to a `res` directory (`drawable-hdpi/icon.9.png`).
///
/// `values*` folders are skipped: their contents are compiled into the
/// resource table rather than shipped as files.
pub fn resource_file(relative: &str) -> Option<ResourceFile> {
    let relative = relative.trim_start_matches('/');
    let (qualifier, file) = relative.split_once('/')?;
    if file.is_empty() || file.contains('/') || qualifier.is_empty() {
        return None;
    }
    let ty = qualifier.split('-').next().unwrap_or(qualifier);
    if ty == "values" {
        return None;
    }
    let name = file.split('.').next().unwrap_or(file);
    if name.is_empty() {
        return None;
    }
    Some(ResourceFile { key: format!("{ty}:{name}"), mapped_path: format!("res/{qualifier}/{file}") })
}

/// Split symbol-list totals into declared and transitive counts.
pub fn resource_counts(symbols: Option<&SymbolList>, declared_keys: &BTreeSet<String>) -> ResourceCounts {
    let declared = declared_keys.len() as u32;
    let total = symbols.map(SymbolList::total).unwrap_or(declared);
    ResourceCounts { declared, transitive: total.saturating_sub(declared), total: total.max(declared) }
}
