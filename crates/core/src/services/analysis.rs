use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::attribution::{AttributionEngine, SizeReport};
use crate::config::SizeConfig;
use crate::mapping::MappingTables;
use crate::model::{ArtifactKind, RawFileEntry, RawPackageEntry};
use crate::store::{load_tables, MappingLayout, StoreError};

/// Decoder output for one artifact: its file listing and dex package tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedArtifact {
    pub kind: ArtifactKind,
    #[serde(default)]
    pub files: Vec<RawFileEntry>,
    #[serde(default)]
    pub packages: Vec<RawPackageEntry>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed decoder output in {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Artifact not found at {0}")]
    MissingArtifact(PathBuf),
    #[error("Decoder not found: {0}")]
    MissingDecoder(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0} producer panicked; attribution input is incomplete")]
    ProducerPanicked(&'static str),
}

/// Turns an artifact on disk into file entries and a package tree.
pub trait ArtifactDecoder: Send + Sync {
    fn decode(&self, artifact: &Path) -> Result<DecodedArtifact, DecodeError>;
    fn name(&self) -> &'static str;
}

/// Registry for artifact decoders; callers select by name.
#[derive(Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Box<dyn ArtifactDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self { decoders: HashMap::new() }
    }

    pub fn register<D: ArtifactDecoder + 'static>(&mut self, decoder: D) -> &mut Self {
        self.decoders.insert(decoder.name().to_string(), Box::new(decoder));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn ArtifactDecoder> {
        self.decoders.get(name).map(|d| &**d)
    }

    /// Sorted decoder names for error messages/help.
    pub fn names(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.decoders.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Reads a decoder dump previously written as JSON (`{ kind, files, packages }`).
pub struct JsonDumpDecoder;

impl ArtifactDecoder for JsonDumpDecoder {
    fn decode(&self, artifact: &Path) -> Result<DecodedArtifact, DecodeError> {
        let raw = std::fs::read_to_string(artifact)
            .map_err(|source| DecodeError::Io { path: artifact.to_path_buf(), source })?;
        serde_json::from_str(&raw).map_err(|e| DecodeError::Malformed {
            path: artifact.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "json-dump"
    }
}

/// Registry populated with the built-in decoders.
pub fn default_decoder_registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::new();
    registry.register(JsonDumpDecoder);
    registry
}

/// Attribute decoded entries against already-loaded tables.
///
/// File and package producers feed the engine concurrently; the scope joins
/// both before the compute phase. A panicking producer fails the run after its
/// peer has finished.
pub fn attribute_decoded(
    tables: MappingTables,
    config: SizeConfig,
    decoded: DecodedArtifact,
) -> Result<SizeReport, AnalysisError> {
    let DecodedArtifact { kind, files, packages } = decoded;
    let engine = AttributionEngine::new(tables, config, kind);

    let failed = std::thread::scope(|scope| {
        let engine = &engine;
        let file_producer = scope.spawn(move || {
            for file in files {
                engine.collect_file(file);
            }
        });
        let package_producer = scope.spawn(move || engine.collect_dex_packages(packages));

        let mut failed = None;
        if file_producer.join().is_err() {
            error!("file producer panicked");
            failed = Some("file");
        }
        if package_producer.join().is_err() {
            error!("package producer panicked");
            failed = failed.or(Some("package"));
        }
        failed
    });
    if let Some(producer) = failed {
        return Err(AnalysisError::ProducerPanicked(producer));
    }

    Ok(engine.compute())
}

/// Load the variant's tables, decode the artifact, and compute its report.
pub fn analyze_artifact(
    decoder: &dyn ArtifactDecoder,
    artifact: &Path,
    layout: &MappingLayout,
    config: &SizeConfig,
) -> Result<SizeReport, AnalysisError> {
    if !artifact.is_file() {
        return Err(AnalysisError::MissingArtifact(artifact.to_path_buf()));
    }
    let tables = load_tables(layout)?;
    let decoded = decoder.decode(artifact)?;
    info!(
        decoder = decoder.name(),
        artifact = %artifact.display(),
        files = decoded.files.len(),
        packages = decoded.packages.len(),
        "decoded artifact"
    );
    attribute_decoded(tables, config.clone(), decoded)
}
