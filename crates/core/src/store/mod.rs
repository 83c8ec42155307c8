//! Persistence of the mapping tables.
//!
//! Tables are plain JSON files (see `MappingLayout`). Loading is strict:
//! attribution cannot proceed from missing, unparsable, or mutually
//! inconsistent tables, so every such problem is a `StoreError` and never a
//! silent default.

mod layout;

pub use layout::MappingLayout;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::mapping::{MappingTables, ModuleMetadata, PackageMappingTable, ResourceMappingTable};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapping table missing at {0}; run mapping generation first")]
    Missing(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The tables were not produced by the same generation run.
    #[error("{table} was generated for module fingerprint {found}, metadata has {expected}")]
    FingerprintMismatch { table: &'static str, expected: String, found: String },

    #[error("inconsistent mapping tables: {0}")]
    Inconsistent(String),
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Write all three tables for the layout's variant.
pub fn save_tables(layout: &MappingLayout, tables: &MappingTables) -> StoreResult<()> {
    std::fs::create_dir_all(&layout.variant_dir)
        .map_err(|source| StoreError::Io { path: layout.variant_dir.clone(), source })?;
    write_json(&layout.metadata_path, &tables.metadata)?;
    write_json(&layout.resource_mapping_path, &tables.resources)?;
    write_json(&layout.package_mapping_path, &tables.packages)?;
    info!(dir = %layout.variant_dir.display(), "saved mapping tables");
    Ok(())
}

/// Load and validate all three tables.
pub fn load_tables(layout: &MappingLayout) -> StoreResult<MappingTables> {
    let metadata: ModuleMetadata = read_json(&layout.metadata_path)?;
    let resources: ResourceMappingTable = read_json(&layout.resource_mapping_path)?;
    let packages: PackageMappingTable = read_json(&layout.package_mapping_path)?;
    let tables = MappingTables { metadata, resources, packages };
    validate_tables(&tables)?;
    info!(
        dir = %layout.variant_dir.display(),
        modules = tables.metadata.modules.len(),
        paths = tables.resources.resource_mapping.len(),
        packages = tables.packages.package_mapping.len(),
        "loaded mapping tables"
    );
    Ok(tables)
}

/// Check the cross-table invariants attribution relies on.
pub fn validate_tables(tables: &MappingTables) -> StoreResult<()> {
    let metadata = &tables.metadata;
    let ids = metadata.modules.ids();
    if ids.windows(2).any(|w| w[0] >= w[1]) {
        return Err(StoreError::Inconsistent("module ids are not sorted and unique".into()));
    }

    let expected = metadata.modules.fingerprint();
    for (table, found) in [
        ("module-metadata", &metadata.module_fingerprint),
        ("resource-mapping", &tables.resources.summary.module_fingerprint),
        ("package-mapping", &tables.packages.summary.module_fingerprint),
    ] {
        if *found != expected {
            return Err(StoreError::FingerprintMismatch { table, expected, found: found.clone() });
        }
    }

    let module_count = ids.len() as u32;
    let mut claimed = BTreeSet::new();
    for (fu, members) in &metadata.functional_units {
        for index in members {
            if *index >= module_count {
                return Err(StoreError::Inconsistent(format!(
                    "functional unit {fu} references module index {index} of {module_count}"
                )));
            }
            if !claimed.insert(*index) {
                return Err(StoreError::Inconsistent(format!(
                    "module index {index} belongs to more than one functional unit"
                )));
            }
        }
    }
    if claimed.len() as u32 != module_count {
        return Err(StoreError::Inconsistent(format!(
            "{} of {module_count} modules have no functional unit",
            module_count - claimed.len() as u32
        )));
    }

    let check_index = |index: i32, owner: &str| -> StoreResult<()> {
        let known = if index < 0 {
            tables.resources.fu_index.contains_key(&index)
        } else {
            (index as u32) < module_count
        };
        if known {
            Ok(())
        } else {
            Err(StoreError::Inconsistent(format!("{owner} references unknown index {index}")))
        }
    };
    for (path, indices) in &tables.resources.resource_mapping {
        for index in indices {
            check_index(*index, path)?;
        }
    }
    for (package, entries) in &tables.packages.package_mapping {
        for (index, _) in entries {
            check_index(*index, package)?;
        }
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|source| StoreError::Serialize { path: path.to_path_buf(), source })?;
    std::fs::write(path, json).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    if !path.is_file() {
        return Err(StoreError::Missing(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })
}
