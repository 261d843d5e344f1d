//! Configuration model, defaults, merging, and validation.
//!
//! A built-in default configuration assigns every metric a weight of
//! 1.0 (0.5 for external coupling) and every class an ICP limit of 12
//! under the catch-all pattern. A user document (YAML or JSON) is
//! merged over the defaults: scalar settings replace wholesale, the
//! `metrics` and `icp-limits` maps merge recursively key-by-key.
//!
//! Loading never fails: a missing, malformed, or invalid document falls
//! back to the defaults with a logged reason.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::warn;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::icp::IcpType;
use crate::report::ReportFormat;

/// Default per-class ICP ceiling.
pub const DEFAULT_ICP_LIMIT: f64 = 12.0;
/// Default per-method code-line ceiling.
pub const DEFAULT_METHOD_SLOC_LIMIT: usize = 30;
/// Pattern matching every file.
pub const CATCH_ALL: &str = ".*";
/// Language keys with built-in defaults.
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["java", "kotlin"];

/// Errors surfaced while loading configuration.
///
/// These never escape [`load`]; they are logged and replaced by the
/// default configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// A map that preserves document order.
///
/// Pattern lookup is first-match-wins, so the order in which patterns
/// were written is significant; plain `HashMap`/`BTreeMap` would lose
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> PatternMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert at the end, replacing in place if the key exists.
    pub fn insert(&mut self, key: String, value: V) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for PatternMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IntoIterator for PatternMap<V> {
    type Item = (String, V);
    type IntoIter = std::vec::IntoIter<(String, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<V> FromIterator<(String, V)> for PatternMap<V> {
    fn from_iter<T: IntoIterator<Item = (String, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for PatternMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for PatternMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for MapVisitor<V> {
            type Value = PatternMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of file patterns")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = PatternMap::new();
                while let Some((key, value)) = access.next_entry()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor(PhantomData))
    }
}

/// Settings for the internal-coupling heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalCouplingConfig {
    /// Collect declared packages from the analyzed tree before
    /// scanning and treat them as internal.
    #[serde(default = "default_true")]
    pub auto_detect: bool,
    /// Explicit internal package prefixes.
    #[serde(default)]
    pub packages: Vec<String>,
}

impl Default for InternalCouplingConfig {
    fn default() -> Self {
        Self {
            auto_detect: true,
            packages: Vec::new(),
        }
    }
}

/// Physical line-count settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlocConfig {
    #[serde(rename = "methodLimit", alias = "method_limit")]
    pub method_limit: usize,
}

impl Default for SlocConfig {
    fn default() -> Self {
        Self {
            method_limit: DEFAULT_METHOD_SLOC_LIMIT,
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportingConfig {
    #[serde(default)]
    pub format: ReportFormat,
    #[serde(
        default,
        rename = "outputFile",
        alias = "output_file",
        skip_serializing_if = "Option::is_none"
    )]
    pub output_file: Option<PathBuf>,
}

/// The resolved configuration shared read-only by the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CddConfig {
    /// language -> file pattern -> metric -> weight
    #[serde(default)]
    pub metrics: BTreeMap<String, PatternMap<HashMap<String, f64>>>,
    /// language -> file pattern -> per-class ICP limit
    #[serde(default, rename = "icp-limits", alias = "icp_limits")]
    pub icp_limits: BTreeMap<String, PatternMap<f64>>,
    #[serde(default)]
    pub internal_coupling: InternalCouplingConfig,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub sloc: SlocConfig,
    #[serde(default, alias = "reporter")]
    pub reporting: ReportingConfig,
}

impl Default for CddConfig {
    fn default() -> Self {
        let mut metrics = BTreeMap::new();
        let mut icp_limits = BTreeMap::new();
        for language in SUPPORTED_LANGUAGES {
            let mut weights = HashMap::new();
            for icp_type in IcpType::ALL {
                weights.insert(icp_type.key().to_string(), icp_type.default_weight());
            }
            metrics.insert(
                language.to_string(),
                PatternMap::from_iter([(CATCH_ALL.to_string(), weights)]),
            );
            icp_limits.insert(
                language.to_string(),
                PatternMap::from_iter([(CATCH_ALL.to_string(), DEFAULT_ICP_LIMIT)]),
            );
        }
        Self {
            metrics,
            icp_limits,
            internal_coupling: InternalCouplingConfig::default(),
            include: Vec::new(),
            exclude: Vec::new(),
            sloc: SlocConfig::default(),
            reporting: ReportingConfig::default(),
        }
    }
}

impl CddConfig {
    /// Merge a partial user document over this configuration.
    ///
    /// Scalar settings replace the default when specified; the
    /// `metrics` and `icp-limits` maps merge recursively, so one
    /// metric can be overridden without losing the rest. User-declared
    /// patterns keep the user's order and are consulted before
    /// default-only patterns.
    pub fn merged_with(mut self, user: UserConfig) -> Self {
        if let Some(metrics) = user.metrics {
            for (language, user_patterns) in metrics {
                let base = self.metrics.entry(language).or_default();
                merge_patterns(base, user_patterns, |base, user| base.extend(user));
            }
        }
        if let Some(limits) = user.icp_limits {
            for (language, user_patterns) in limits {
                let base = self.icp_limits.entry(language).or_default();
                merge_patterns(base, user_patterns, |base, user| *base = user);
            }
        }
        if let Some(coupling) = user.internal_coupling {
            if let Some(auto_detect) = coupling.auto_detect {
                self.internal_coupling.auto_detect = auto_detect;
            }
            if let Some(packages) = coupling.packages {
                self.internal_coupling.packages = packages;
            }
        }
        if let Some(include) = user.include {
            self.include = include;
        }
        if let Some(exclude) = user.exclude {
            self.exclude = exclude;
        }
        if let Some(sloc) = user.sloc {
            if let Some(method_limit) = sloc.method_limit {
                self.sloc.method_limit = method_limit;
            }
        }
        if let Some(reporting) = user.reporting {
            if let Some(format) = reporting.format {
                self.reporting.format = format;
            }
            if let Some(output_file) = reporting.output_file {
                self.reporting.output_file = Some(output_file);
            }
        }
        self
    }

    /// Reject negative weights and limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (language, patterns) in &self.metrics {
            for (pattern, weights) in patterns.iter() {
                for (metric, weight) in weights {
                    if !weight.is_finite() || *weight < 0.0 {
                        return Err(ConfigError::Invalid(format!(
                            "weight for {language}/{pattern}/{metric} must be >= 0, got {weight}"
                        )));
                    }
                }
            }
        }
        for (language, patterns) in &self.icp_limits {
            for (pattern, limit) in patterns.iter() {
                if limit.is_nan() || *limit < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "ICP limit for {language}/{pattern} must be >= 0, got {limit}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Merge user pattern entries into the base map. User patterns keep
/// their own relative order and precede base-only patterns, so a more
/// specific user pattern is reachable ahead of the default catch-all.
fn merge_patterns<V>(
    base: &mut PatternMap<V>,
    user: PatternMap<V>,
    mut merge_value: impl FnMut(&mut V, V),
) {
    let mut merged = PatternMap::new();
    for (pattern, value) in user {
        match base.remove(&pattern) {
            Some(mut existing) => {
                merge_value(&mut existing, value);
                merged.insert(pattern, existing);
            }
            None => merged.insert(pattern, value),
        }
    }
    for (pattern, value) in std::mem::take(base) {
        merged.insert(pattern, value);
    }
    *base = merged;
}

/// A partially-specified user document; absent fields keep defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub metrics: Option<BTreeMap<String, PatternMap<HashMap<String, f64>>>>,
    #[serde(default, rename = "icp-limits", alias = "icp_limits")]
    pub icp_limits: Option<BTreeMap<String, PatternMap<f64>>>,
    #[serde(default)]
    pub internal_coupling: Option<UserInternalCoupling>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
    #[serde(default)]
    pub sloc: Option<UserSloc>,
    #[serde(default, alias = "reporter")]
    pub reporting: Option<UserReporting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInternalCoupling {
    #[serde(default)]
    pub auto_detect: Option<bool>,
    #[serde(default)]
    pub packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSloc {
    #[serde(default, rename = "methodLimit", alias = "method_limit")]
    pub method_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserReporting {
    #[serde(default)]
    pub format: Option<ReportFormat>,
    #[serde(default, rename = "outputFile", alias = "output_file")]
    pub output_file: Option<PathBuf>,
}

/// Load configuration from `path`, falling back to the defaults on any
/// failure.
pub fn load(path: &Path) -> CddConfig {
    match try_load(path) {
        Ok(config) => config,
        Err(err) => {
            warn!("{err}; using default configuration");
            CddConfig::default()
        }
    }
}

/// Load and validate a user document, merged over the defaults.
pub fn try_load(path: &Path) -> Result<CddConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let user: UserConfig = if is_json {
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
    } else {
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?
    };

    let merged = CddConfig::default().merged_with(user);
    merged.validate()?;
    Ok(merged)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_metrics() {
        let config = CddConfig::default();
        for language in SUPPORTED_LANGUAGES {
            let weights = config.metrics[language].get(CATCH_ALL).unwrap();
            assert_eq!(weights.len(), IcpType::ALL.len());
            assert_eq!(weights["code_branch"], 1.0);
            assert_eq!(weights["external_coupling"], 0.5);
            assert_eq!(
                config.icp_limits[language].get(CATCH_ALL),
                Some(&DEFAULT_ICP_LIMIT)
            );
        }
        assert_eq!(config.sloc.method_limit, DEFAULT_METHOD_SLOC_LIMIT);
        assert!(config.internal_coupling.auto_detect);
    }

    #[test]
    fn test_merging_empty_user_config_is_identity() {
        let merged = CddConfig::default().merged_with(UserConfig::default());
        assert_eq!(merged, CddConfig::default());
    }

    #[test]
    fn test_merge_overrides_one_metric_keeping_others() {
        let user: UserConfig = serde_yaml::from_str(
            r#"
metrics:
  java:
    ".*":
      code_branch: 2.0
"#,
        )
        .unwrap();
        let merged = CddConfig::default().merged_with(user);

        let java = merged.metrics["java"].get(CATCH_ALL).unwrap();
        assert_eq!(java["code_branch"], 2.0);
        assert_eq!(java["condition"], 1.0);
        // the other language is untouched
        let kotlin = merged.metrics["kotlin"].get(CATCH_ALL).unwrap();
        assert_eq!(kotlin["code_branch"], 1.0);
    }

    #[test]
    fn test_user_patterns_precede_defaults() {
        let user: UserConfig = serde_yaml::from_str(
            r#"
icp-limits:
  java:
    "Legacy.*": 40
"#,
        )
        .unwrap();
        let merged = CddConfig::default().merged_with(user);

        let patterns: Vec<&str> = merged.icp_limits["java"].iter().map(|(k, _)| k).collect();
        assert_eq!(patterns, vec!["Legacy.*", CATCH_ALL]);
    }

    #[test]
    fn test_scalar_settings_replace_wholesale() {
        let user: UserConfig = serde_yaml::from_str(
            r#"
sloc:
  methodLimit: 50
internal_coupling:
  auto_detect: false
  packages: ["com.acme"]
reporting:
  format: markdown
"#,
        )
        .unwrap();
        let merged = CddConfig::default().merged_with(user);
        assert_eq!(merged.sloc.method_limit, 50);
        assert!(!merged.internal_coupling.auto_detect);
        assert_eq!(merged.internal_coupling.packages, vec!["com.acme"]);
        assert_eq!(merged.reporting.format, ReportFormat::Markdown);
    }

    #[test]
    fn test_negative_weight_is_rejected() {
        let user: UserConfig = serde_yaml::from_str(
            r#"
metrics:
  java:
    ".*":
      condition: -1.0
"#,
        )
        .unwrap();
        let merged = CddConfig::default().merged_with(user);
        assert!(merged.validate().is_err());
    }

    #[test]
    fn test_negative_limit_is_rejected() {
        let user: UserConfig = serde_yaml::from_str("icp-limits: {java: {\".*\": -3}}").unwrap();
        let merged = CddConfig::default().merged_with(user);
        assert!(merged.validate().is_err());
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        // missing file
        let config = load(&dir.path().join("missing.yaml"));
        assert_eq!(config, CddConfig::default());

        // malformed document
        let bad = dir.path().join("cdd.yaml");
        fs::write(&bad, ": not yaml {{{").unwrap();
        assert_eq!(load(&bad), CddConfig::default());

        // invalid values
        let invalid = dir.path().join("invalid.yaml");
        fs::write(&invalid, "icp-limits: {java: {\".*\": -1}}").unwrap();
        assert_eq!(load(&invalid), CddConfig::default());
    }

    #[test]
    fn test_load_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdd.json");
        fs::write(&path, r#"{"sloc": {"methodLimit": 10}}"#).unwrap();
        let config = load(&path);
        assert_eq!(config.sloc.method_limit, 10);
    }

    #[test]
    fn test_pattern_map_preserves_document_order() {
        let map: PatternMap<f64> =
            serde_yaml::from_str("\"z.*\": 1\n\"a.*\": 2\n\".*\": 3\n").unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z.*", "a.*", ".*"]);
    }

    #[test]
    fn test_legacy_reporter_alias() {
        let user: UserConfig = serde_yaml::from_str("reporter: {format: xml}").unwrap();
        let merged = CddConfig::default().merged_with(user);
        assert_eq!(merged.reporting.format, ReportFormat::Xml);
    }
}
