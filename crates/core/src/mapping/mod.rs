//! Mapping generation: module index, FU partition, and the three lookup tables.
//!
//! Tables are produced once per build variant and treated as immutable inputs
//! by every later attribution run.

pub mod emitter;
pub mod index;
pub mod tables;

pub use emitter::{MappingEmitter, BASE_MODULE_DIR};
pub use index::{assign_functional_units, fallback_fu, filter_modules};
pub use tables::{
    FuIndex, FunctionalUnitMap, MappingTables, ModuleIndex, ModuleMetadata, PackageMappingTable,
    PackageSummary, ResourceMappingTable, ResourceSummary,
};
