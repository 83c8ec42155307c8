mod common;

use std::path::Path;

use common::{touch, ZipBuilder};
use lobsize_core::attribution::{write_report, SizeReport};
use lobsize_core::config::SizeConfig;
use lobsize_core::model::{ArtifactKind, ModuleDescriptor, ModuleKind, SourceSet};
use lobsize_core::services::{
    analyze_artifact, default_decoder_registry, AnalysisError, DecodeError, JsonDumpDecoder,
    MappingGenerator, ModuleSource, StaticModuleSource,
};
use lobsize_core::store::{MappingLayout, StoreError};
use serde_json::json;
use tempfile::tempdir;

fn config() -> SizeConfig {
    SizeConfig {
        functional_unit_mapping: [
            ("hotels", vec!["com.mmt.*".to_string()]),
            ("core", vec!["app".to_string()]),
        ]
        .into_iter()
        .collect(),
        scan_threads: 2,
        ..SizeConfig::default()
    }
}

/// Lay out two remote modules and an app module; return the inventory path.
fn write_project(root: &Path) -> std::path::PathBuf {
    let classes = ZipBuilder::new().deflated("com/mmt/hotels/Search.class", b"x").build();
    let aar = root.join("repo/hotels.aar");
    ZipBuilder::new()
        .stored("res/drawable/x.webp", b"webp")
        .stored("classes.jar", &classes)
        .write_to(&aar);
    let jar = root.join("repo/okio.jar");
    ZipBuilder::new().stored("okio/Buffer.class", b"x").write_to(&jar);

    let app = root.join("app");
    touch(&app.join("custom-res/drawable/app_icon.png"), b"png");

    let inventory = json!({
        "modules": [
            { "id": "com.mmt:hotels", "kind": { "type": "remote_library", "archive": aar } },
            { "id": "com.squareup.okio:okio", "kind": { "type": "remote_archive", "archive": jar } },
            {
                "id": ":app",
                "kind": { "type": "app_module", "location": { "project_dir": app, "build_dir": app.join("build") } },
                "sources": { "res": [app.join("custom-res")] }
            }
        ]
    });
    let path = root.join("modules.json");
    std::fs::write(&path, serde_json::to_string_pretty(&inventory).expect("inventory json"))
        .expect("write inventory");
    path
}

fn write_dump(path: &Path) {
    let dump = json!({
        "kind": "apk",
        "files": [
            { "path": "res/drawable/x.webp", "size_bytes": 500 },
            { "path": "res/drawable/app_icon.png", "size_bytes": 64 },
            { "path": "classes.dex", "size_bytes": 2000 },
            { "path": "resources.arsc", "size_bytes": 900 }
        ],
        "packages": [
            { "package": "com.mmt.hotels", "depth": 3, "size_bytes": 1200 },
            { "package": "okio", "depth": 1, "size_bytes": 100 }
        ]
    });
    std::fs::write(path, dump.to_string()).expect("write dump");
}

#[test]
fn inventory_source_lists_modules_and_declared_sources() {
    let dir = tempdir().expect("tempdir");
    let source = StaticModuleSource::load(&write_project(dir.path())).expect("load inventory");
    let modules = source.list_modules();
    assert_eq!(modules.len(), 3);
    let app = modules.iter().find(|m| m.id == ":app").expect("app module");
    assert_eq!(source.source_dirs_for(app).res, vec![dir.path().join("app/custom-res")]);
    assert!(source.source_dirs_for(&modules[0]).is_empty());
}

#[test]
fn generate_then_analyze_end_to_end() {
    let dir = tempdir().expect("tempdir");
    let source = StaticModuleSource::load(&write_project(dir.path())).expect("load inventory");
    let config = config();
    let out = dir.path().join("size-mappings");

    let generated = MappingGenerator::new(&config)
        .with_project_root(dir.path())
        .generate_and_save(&source, &out)
        .expect("generate mappings");
    assert_eq!(generated.warning_count(), 0);
    let ids: Vec<&str> = generated.modules.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![":app", "com.mmt:hotels", "com.squareup.okio:okio"]);

    let layout = MappingLayout::new(&out, "release");
    assert!(layout.is_complete());

    let dump = dir.path().join("app-release.dump.json");
    write_dump(&dump);
    let report = analyze_artifact(&JsonDumpDecoder, &dump, &layout, &config).expect("analyze");

    assert_eq!(report.artifact_kind, ArtifactKind::Apk);
    assert_eq!(report.variant, "release");
    let hotels = report.breakdown("hotels").expect("hotels");
    assert_eq!((hotels.resources, hotels.code), (500, 1200));
    assert_eq!(report.breakdown("core").map(|b| b.resources), Some(64));
    assert_eq!(report.breakdown("thirdparty").map(|b| b.code), Some(100));
    assert_eq!(report.unattributed_bytes(), 0);
    assert_eq!(report.ignored_file_bytes, 900);
    assert_eq!(report.code_overhead_bytes, 700);

    let report_path = dir.path().join("report.json");
    write_report(&report_path, &report).expect("write report");
    let back: SizeReport =
        serde_json::from_str(&std::fs::read_to_string(&report_path).expect("read report")).expect("parse report");
    assert_eq!(back, report);
}

#[test]
fn analysis_fails_without_tables_or_artifact() {
    let dir = tempdir().expect("tempdir");
    let layout = MappingLayout::new(dir.path().join("size-mappings"), "release");
    let config = SizeConfig::default();

    let missing = dir.path().join("absent.json");
    let err = analyze_artifact(&JsonDumpDecoder, &missing, &layout, &config).expect_err("no artifact");
    assert!(matches!(err, AnalysisError::MissingArtifact(_)));

    let dump = dir.path().join("dump.json");
    write_dump(&dump);
    let err = analyze_artifact(&JsonDumpDecoder, &dump, &layout, &config).expect_err("no tables");
    assert!(matches!(err, AnalysisError::Store(StoreError::Missing(_))));
}

#[test]
fn malformed_dump_is_decode_error() {
    let dir = tempdir().expect("tempdir");
    let source = StaticModuleSource::load(&write_project(dir.path())).expect("load inventory");
    let config = config();
    let out = dir.path().join("out");
    MappingGenerator::new(&config).generate_and_save(&source, &out).expect("generate mappings");

    let dump = dir.path().join("dump.json");
    std::fs::write(&dump, r#"{ "kind": "zip", "files": [] }"#).expect("write dump");
    let err = analyze_artifact(&JsonDumpDecoder, &dump, &MappingLayout::new(&out, "release"), &config)
        .expect_err("unknown kind");
    assert!(matches!(err, AnalysisError::Decode(DecodeError::Malformed { .. })));
}

#[test]
fn default_registry_exposes_json_decoder() {
    let registry = default_decoder_registry();
    assert_eq!(registry.names(), vec!["json-dump".to_string()]);
    assert!(registry.get("json-dump").is_some());
    assert!(registry.get("apkanalyzer").is_none());
}

/// A broken archive yields a warning on its own module; the others scan normally.
#[test]
fn generator_isolates_unreadable_module() {
    let dir = tempdir().expect("tempdir");
    let broken = dir.path().join("broken.aar");
    std::fs::write(&broken, b"not a zip").expect("write broken archive");
    let jar = dir.path().join("okio.jar");
    ZipBuilder::new().stored("okio/Buffer.class", b"x").write_to(&jar);
    let aar = dir.path().join("hotels.aar");
    ZipBuilder::new().stored("res/drawable/x.webp", b"webp").write_to(&aar);

    let source = StaticModuleSource::new()
        .with_module(ModuleDescriptor::new("x:broken", ModuleKind::RemoteLibrary { archive: broken }), SourceSet::default())
        .with_module(ModuleDescriptor::new("com.squareup.okio:okio", ModuleKind::RemoteArchive { archive: jar }), SourceSet::default())
        .with_module(ModuleDescriptor::new("com.mmt:hotels", ModuleKind::RemoteLibrary { archive: aar }), SourceSet::default());
    let config = config();
    let scanned = MappingGenerator::new(&config).scan(&source);

    let ids: Vec<&str> = scanned.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["com.mmt:hotels", "com.squareup.okio:okio", "x:broken"]);
    assert!(scanned[0].warnings.is_empty());
    assert!(scanned[0].mapped_files.contains("res/drawable/x.webp"));
    assert!(scanned[1].warnings.is_empty());
    assert_eq!(scanned[1].classes_by_package.get("okio"), Some(&1));
    assert_eq!(scanned[2].warnings.len(), 1);
    assert!(scanned[2].warnings[0].starts_with("cannot read library archive"));
}

/// Duplicate ids come out in kind order, so the emitted tables never depend on thread timing.
#[test]
fn duplicate_module_ids_are_ordered_by_kind() {
    let dir = tempdir().expect("tempdir");
    let jar = dir.path().join("dup.jar");
    ZipBuilder::new().stored("com/x/A.class", b"x").write_to(&jar);
    let aar_classes = ZipBuilder::new().stored("com/y/B.class", b"x").build();
    let aar = dir.path().join("dup.aar");
    ZipBuilder::new().stored("classes.jar", &aar_classes).write_to(&aar);

    let source = StaticModuleSource::new()
        .with_module(ModuleDescriptor::new("com.mmt:dup", ModuleKind::RemoteLibrary { archive: aar }), SourceSet::default())
        .with_module(ModuleDescriptor::new("com.mmt:dup", ModuleKind::RemoteArchive { archive: jar }), SourceSet::default());
    let config = config();
    for _ in 0..8 {
        let generated = MappingGenerator::new(&config).generate(&source);
        let kinds: Vec<&str> = generated.modules.iter().map(|m| m.kind.label()).collect();
        assert_eq!(kinds, vec!["remote_archive", "remote_library"]);
        let packages = &generated.tables.packages.package_mapping;
        assert!(packages.contains_key("com.x"));
        assert!(!packages.contains_key("com.y"));
    }
}
