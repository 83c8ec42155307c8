use std::path::PathBuf;

use chrono::Utc;
use crossbeam::channel;
use tracing::{info, warn};

use crate::config::SizeConfig;
use crate::mapping::{filter_modules, MappingEmitter, MappingTables};
use crate::model::{ModuleDescriptor, ScannedModule, SourceSet};
use crate::scanner::ArchiveScanner;
use crate::services::sources::ModuleSource;
use crate::store::{save_tables, MappingLayout, StoreResult};

/// Output of one mapping generation run.
#[derive(Debug, Clone)]
pub struct GeneratedMappings {
    pub tables: MappingTables,
    /// Scan results sorted by module id, warnings included.
    pub modules: Vec<ScannedModule>,
}

impl GeneratedMappings {
    pub fn warning_count(&self) -> usize {
        self.modules.iter().map(|m| m.warnings.len()).sum()
    }
}

/// Drives module scanning and table emission for one variant.
pub struct MappingGenerator<'a> {
    config: &'a SizeConfig,
    project_root: Option<PathBuf>,
}

impl<'a> MappingGenerator<'a> {
    pub fn new(config: &'a SizeConfig) -> Self {
        Self { config, project_root: None }
    }

    /// Root that relative directory overrides are resolved against.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Scan every included module on a worker pool.
    pub fn scan(&self, source: &dyn ModuleSource) -> Vec<ScannedModule> {
        let modules = filter_modules(source.list_modules(), self.config);
        let jobs: Vec<(ModuleDescriptor, SourceSet)> = modules
            .into_iter()
            .map(|m| {
                let sources = match m.kind.project_location() {
                    Some(_) => source.source_dirs_for(&m),
                    None => SourceSet::default(),
                };
                (m, sources)
            })
            .collect();

        let threads = self.config.effective_scan_threads().min(jobs.len()).max(1);
        info!(modules = jobs.len(), threads, variant = %self.config.variant, "scanning modules");

        let scanner = ArchiveScanner::new(self.config.variant.clone());
        let (job_tx, job_rx) = channel::unbounded::<(ModuleDescriptor, SourceSet)>();
        let (result_tx, result_rx) = channel::unbounded::<ScannedModule>();
        for job in jobs {
            if let Err(err) = job_tx.send(job) {
                let (descriptor, _) = err.into_inner();
                warn!(module = %descriptor.id, "scan queue closed; module skipped");
            }
        }
        drop(job_tx);

        std::thread::scope(|scope| {
            for _ in 0..threads {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let scanner = &scanner;
                scope.spawn(move || {
                    for (descriptor, sources) in job_rx.iter() {
                        if result_tx.send(scanner.scan(&descriptor, &sources)).is_err() {
                            warn!(module = %descriptor.id, "result channel closed; scan dropped");
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut scanned: Vec<ScannedModule> = result_rx.iter().collect();
        scanned.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.kind.label().cmp(b.kind.label())));
        scanned
    }

    /// Scan and emit the three tables.
    pub fn generate(&self, source: &dyn ModuleSource) -> GeneratedMappings {
        let modules = self.scan(source);
        let mut emitter = MappingEmitter::new(self.config);
        if let Some(root) = &self.project_root {
            emitter = emitter.with_project_root(root.clone());
        }
        let tables = emitter.emit(&modules, Utc::now().to_rfc3339());
        let generated = GeneratedMappings { tables, modules };
        let warnings = generated.warning_count();
        if warnings > 0 {
            warn!(warnings, "mapping generation finished with module warnings");
        }
        generated
    }

    /// Generate and persist the tables under `output_root/<variant>/`.
    pub fn generate_and_save(
        &self,
        source: &dyn ModuleSource,
        output_root: impl Into<PathBuf>,
    ) -> StoreResult<GeneratedMappings> {
        let generated = self.generate(source);
        let layout = MappingLayout::new(output_root.into(), &self.config.variant);
        save_tables(&layout, &generated.tables)?;
        Ok(generated)
    }
}
