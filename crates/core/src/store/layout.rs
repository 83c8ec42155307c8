use std::path::{Path, PathBuf};

/// On-disk layout of the mapping tables for one variant.
///
/// This is derived from a chosen output root. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct MappingLayout {
    /// Root directory holding one subdirectory per variant.
    pub root: PathBuf,
    /// Directory for this variant's tables.
    pub variant_dir: PathBuf,
    /// `module-metadata.json`.
    pub metadata_path: PathBuf,
    /// `resource-mapping.json`.
    pub resource_mapping_path: PathBuf,
    /// `package-mapping.json`.
    pub package_mapping_path: PathBuf,
}

impl MappingLayout {
    /// Compute the layout for `variant` under `root`.
    pub fn new(root: impl AsRef<Path>, variant: &str) -> Self {
        let root = root.as_ref().to_path_buf();
        let variant_dir = root.join(variant);
        let metadata_path = variant_dir.join("module-metadata.json");
        let resource_mapping_path = variant_dir.join("resource-mapping.json");
        let package_mapping_path = variant_dir.join("package-mapping.json");

        Self { root, variant_dir, metadata_path, resource_mapping_path, package_mapping_path }
    }

    /// True when all three tables exist.
    pub fn is_complete(&self) -> bool {
        self.metadata_path.is_file()
            && self.resource_mapping_path.is_file()
            && self.package_mapping_path.is_file()
    }
}
