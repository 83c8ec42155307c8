use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string-keyed map that keeps declaration order.
///
/// FU mappings are resolved first-match-wins in the order they are written in
/// the configuration file, so a sorted or hashed map would change results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace, keeping the position of an existing key.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = OrderedMap::new();
                while let Some((k, v)) = access.next_entry::<String, V>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// Value of a `packageOverrides` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOverride {
    /// Drop the package (and everything below it) from the package mapping.
    Ignore,
    /// Attribute the package (and everything below it) to this FU.
    Fu(String),
}

impl Serialize for PackageOverride {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PackageOverride::Ignore => serializer.serialize_str("ignore"),
            PackageOverride::Fu(name) => serializer.serialize_str(name),
        }
    }
}

impl<'de> Deserialize<'de> for PackageOverride {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw.eq_ignore_ascii_case("ignore") {
            PackageOverride::Ignore
        } else {
            PackageOverride::Fu(raw)
        })
    }
}

fn default_variant() -> String {
    "release".to_string()
}

fn default_include_patterns() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_package_depth() -> u32 {
    8
}

fn default_min_package_depth() -> u32 {
    2
}

fn default_ignored_file_names() -> Vec<String> {
    vec!["resources.arsc".to_string(), "resources.pb".to_string()]
}

/// Size attribution configuration shared by mapping generation and analysis.
///
/// Every field is optional in the serialized form; missing fields take the
/// documented defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeConfig {
    /// Build variant the mapping tables are generated for.
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub include_local_modules: bool,
    /// Packages deeper than this are truncated before being mapped.
    #[serde(default = "default_package_depth")]
    pub package_depth: u32,
    /// Ancestor propagation stops at this depth.
    #[serde(default = "default_min_package_depth")]
    pub min_package_depth: u32,
    #[serde(default)]
    pub functional_unit_mapping: OrderedMap<Vec<String>>,
    #[serde(default)]
    pub package_overrides: OrderedMap<PackageOverride>,
    #[serde(default, rename = "resourceFUOverrides")]
    pub resource_fu_overrides: OrderedMap<Vec<String>>,
    #[serde(default, rename = "resourceDirFUOverrides")]
    pub resource_dir_fu_overrides: OrderedMap<Vec<String>>,
    /// Namespaces owned by the app; enables the third-party code fallback.
    #[serde(default)]
    pub app_package_prefixes: Vec<String>,
    #[serde(default = "default_ignored_file_names")]
    pub ignored_file_names: Vec<String>,
    /// Scanner worker threads; 0 picks the available parallelism.
    #[serde(default)]
    pub scan_threads: usize,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            include_patterns: default_include_patterns(),
            exclude_patterns: Vec::new(),
            include_local_modules: true,
            package_depth: default_package_depth(),
            min_package_depth: default_min_package_depth(),
            functional_unit_mapping: OrderedMap::new(),
            package_overrides: OrderedMap::new(),
            resource_fu_overrides: OrderedMap::new(),
            resource_dir_fu_overrides: OrderedMap::new(),
            app_package_prefixes: Vec::new(),
            ignored_file_names: default_ignored_file_names(),
            scan_threads: 0,
        }
    }
}

impl SizeConfig {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.variant.trim().is_empty() {
            bail!("variant must not be empty");
        }
        if self.min_package_depth == 0 {
            bail!("minPackageDepth must be at least 1");
        }
        if self.package_depth < self.min_package_depth {
            bail!(
                "packageDepth ({}) must not be smaller than minPackageDepth ({})",
                self.package_depth,
                self.min_package_depth
            );
        }
        Ok(())
    }

    pub fn effective_scan_threads(&self) -> usize {
        if self.scan_threads > 0 {
            self.scan_threads
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }
}

/// Load a configuration file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
pub fn load_size_config(path: &Path) -> Result<SizeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read size config at {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("yaml" | "yml")
    );
    let config: SizeConfig = if is_yaml {
        serde_yaml::from_str(&raw).context("Failed to parse size config YAML")?
    } else {
        serde_json::from_str(&raw).context("Failed to parse size config JSON")?
    };
    config.validate().with_context(|| format!("Invalid size config at {}", path.display()))?;
    Ok(config)
}
