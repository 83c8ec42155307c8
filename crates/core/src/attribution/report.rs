use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::attribution::resolve::PathTransform;
use crate::model::{ArtifactKind, FileCategory, LobSizeBreakdown};

/// How a file was attributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileResolution {
    Mapped { transform: PathTransform, base_prefixed: bool },
    /// Namespace fallback to a reserved FU.
    Fallback,
    Unmatched,
}

/// Per-file detail row for human review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetail {
    pub path: String,
    pub size_bytes: u64,
    pub category: FileCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fu: Option<String>,
    pub resolution: FileResolution,
    /// Module indices that all claim this path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colliding_modules: Vec<i32>,
}

/// How a code package was attributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageResolution {
    Exact,
    /// Resolved through the nearest mapped ancestor.
    Ancestor { package: String },
    Fallback,
    Unmatched,
}

/// Bytes of one package attributed to one FU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuShare {
    pub fu: String,
    pub bytes: u64,
}

/// Per-package detail row; `size_bytes` is the package's remaining (non-child) size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDetail {
    pub package: String,
    pub size_bytes: u64,
    pub resolution: PackageResolution,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shares: Vec<FuShare>,
}

/// Result of one attribution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeReport {
    pub artifact_kind: ArtifactKind,
    pub variant: String,
    pub functional_units: BTreeMap<String, LobSizeBreakdown>,
    pub total: LobSizeBreakdown,
    pub unmatched_file_bytes: u64,
    pub unmatched_code_bytes: u64,
    pub ignored_file_bytes: u64,
    /// Bytes of the raw code containers (`classes*.dex`).
    pub raw_code_bytes: u64,
    /// Raw code bytes not explained by any package (headers, string/symbol tables).
    pub code_overhead_bytes: u64,
    /// Scale applied to package-level code bytes, when they exceeded the raw code bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex_scale: Option<f64>,
    pub coverage_percent: f64,
    pub collisions: usize,
    pub files: Vec<FileDetail>,
    pub packages: Vec<PackageDetail>,
}

impl SizeReport {
    pub fn breakdown(&self, fu: &str) -> Option<&LobSizeBreakdown> {
        self.functional_units.get(fu)
    }

    pub fn unattributed_bytes(&self) -> u64 {
        self.unmatched_file_bytes + self.unmatched_code_bytes
    }
}

/// Coverage in percent, rounded to two decimals; 0 when nothing was measured.
pub fn coverage_percent(attributed: u64, unattributed: u64) -> f64 {
    let denominator = attributed + unattributed;
    if denominator == 0 {
        return 0.0;
    }
    let percent = attributed as f64 / denominator as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Write a report as pretty JSON.
pub fn write_report(path: &Path, report: &SizeReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize size report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write size report to {}", path.display()))
}
