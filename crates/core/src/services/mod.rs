pub mod analysis;
pub mod generation;
pub mod sources;

pub use analysis::{
    analyze_artifact, attribute_decoded, default_decoder_registry, AnalysisError, ArtifactDecoder,
    DecodeError, DecodedArtifact, DecoderRegistry, JsonDumpDecoder,
};
pub use generation::{GeneratedMappings, MappingGenerator};
pub use sources::{InventoryEntry, ModuleInventory, ModuleSource, StaticModuleSource};
