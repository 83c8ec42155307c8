use lobsize_core::config::{load_size_config, OrderedMap, PackageOverride, SizeConfig};
use lobsize_core::glob::{matches, normalize_id, should_include, GlobSet, ModuleFilter};
use proptest::prelude::*;
use tempfile::tempdir;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn glob_star_matches_any_suffix_and_dot_is_literal() {
    assert!(matches("com.mmt.*", "com.mmt.hotels"));
    assert!(!matches("com.mmt.*", "com.other.hotels"));
    assert!(matches("com.mmt.*", "com.mmt."));
    assert!(!matches("com.mmt", "comXmmt"));
    assert!(matches("*okhttp*", "com.squareup.okhttp3.okhttp"));
}

#[test]
fn glob_escapes_regex_metacharacters() {
    assert!(matches("res/drawable-v21/a+b.png", "res/drawable-v21/a+b.png"));
    assert!(!matches("res/(x)", "res/x"));
    assert!(matches("lib/*/libfoo.so", "lib/arm64-v8a/libfoo.so"));
}

#[test]
fn normalize_id_unifies_notations() {
    assert_eq!(normalize_id("com.mmt:hotels"), "com.mmt.hotels");
    assert_eq!(normalize_id(":features:hotels"), "features.hotels");
    assert_eq!(normalize_id("libs/core\\x"), "libs.core.x");
}

#[test]
fn should_include_requires_include_and_no_exclude() {
    assert!(should_include("com.mmt:hotels", &strings(&["*"]), &strings(&["com.mmt.other*"])));
    assert!(!should_include("com.mmt:other-lib", &strings(&["*"]), &strings(&["com.mmt.other*"])));
    assert!(!should_include("com.mmt:hotels", &[], &[]));

    let filter = ModuleFilter::new(&strings(&["com.mmt.*"]), &strings(&["*.test*"]));
    assert!(filter.should_include("com.mmt:flights"));
    assert!(!filter.should_include("com.mmt:flights.testing"));
    assert!(!filter.should_include("org.other:lib"));
}

#[test]
fn glob_set_reports_first_declared_match() {
    let set = GlobSet::new(["com.mmt.hotels*", "com.mmt.*"]);
    assert!(!set.is_empty());
    assert_eq!(set.first_match("com.mmt.hotels.ui"), Some("com.mmt.hotels*"));
    assert_eq!(set.first_match("com.mmt.bus"), Some("com.mmt.*"));
    assert_eq!(set.first_match("org.x"), None);
}

proptest! {
    #[test]
    fn literal_pattern_matches_only_itself(value in "[a-z.:_/()+-]{0,24}", other in "[a-z.]{0,24}") {
        prop_assert!(matches(&value, &value));
        if other != value {
            prop_assert!(!matches(&value, &other));
        }
    }

    #[test]
    fn star_wrapped_pattern_matches_any_container(prefix in "[a-z.]{0,8}", mid in "[a-z.]{1,8}", suffix in "[a-z.]{0,8}") {
        let pattern = format!("*{mid}*");
        let value = format!("{prefix}{mid}{suffix}");
        prop_assert!(matches(&pattern, &value));
    }
}

#[test]
fn config_defaults_apply_to_empty_document() {
    let config: SizeConfig = serde_json::from_str("{}").expect("parse empty config");
    assert_eq!(config, SizeConfig::default());
    assert_eq!(config.variant, "release");
    assert_eq!(config.include_patterns, strings(&["*"]));
    assert!(config.include_local_modules);
    assert_eq!(config.package_depth, 8);
    assert_eq!(config.min_package_depth, 2);
    assert_eq!(config.ignored_file_names, strings(&["resources.arsc", "resources.pb"]));
    config.validate().expect("defaults are valid");
}

#[test]
fn yaml_config_keeps_declaration_order_and_override_kinds() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("size.yaml");
    std::fs::write(
        &path,
        r#"
variant: debug
functionalUnitMapping:
  zeta: ["com.mmt.zeta*"]
  alpha: ["com.mmt.*"]
packageOverrides:
  com.mmt.legacy: IGNORE
  com.mmt.shared: platform_team
resourceFUOverrides:
  design: ["base/res/drawable/brand_*"]
appPackagePrefixes: ["com.mmt"]
"#,
    )
    .expect("write config");

    let config = load_size_config(&path).expect("load yaml config");
    assert_eq!(config.variant, "debug");
    let order: Vec<&str> = config.functional_unit_mapping.iter().map(|(k, _)| k).collect();
    assert_eq!(order, vec!["zeta", "alpha"]);
    assert_eq!(config.package_overrides.get("com.mmt.legacy"), Some(&PackageOverride::Ignore));
    assert_eq!(
        config.package_overrides.get("com.mmt.shared"),
        Some(&PackageOverride::Fu("platform_team".into()))
    );
    assert_eq!(config.resource_fu_overrides.len(), 1);
    assert_eq!(config.app_package_prefixes, strings(&["com.mmt"]));
}

#[test]
fn json_config_round_trips_through_ordered_map() {
    let mut config = SizeConfig::default();
    config.functional_unit_mapping =
        [("b", strings(&["b*"])), ("a", strings(&["a*"]))].into_iter().collect::<OrderedMap<_>>();
    let json = serde_json::to_string(&config).expect("serialize config");
    assert!(json.find("\"b\"") < json.find("\"a\""));
    let back: SizeConfig = serde_json::from_str(&json).expect("deserialize config");
    assert_eq!(back, config);
}

#[test]
fn invalid_depths_are_rejected_with_context() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("size.json");
    std::fs::write(&path, r#"{ "packageDepth": 1, "minPackageDepth": 3 }"#).expect("write config");
    let err = load_size_config(&path).expect_err("depths are inconsistent");
    let message = format!("{err:#}");
    assert!(message.contains("Invalid size config"), "{message}");
    assert!(message.contains("packageDepth"), "{message}");
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let err = load_size_config(&dir.path().join("absent.json")).expect_err("file is missing");
    assert!(format!("{err:#}").contains("Failed to read size config"));
}
