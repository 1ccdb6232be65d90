//! Batch-matching configuration.
//!
//! A YAML file with two required mappings, `modelresults` and
//! `observations`, keyed by entry name:
//!
//! ```yaml
//! modelresults:
//!   HD:
//!     filename: model/hd_stations.csv
//!     item: HKNA
//! observations:
//!   HKNA:
//!     filename: ${OBS_DIR:-obs}/hkna.csv
//!     x: 4.24
//!     y: 52.0
//! max_model_gap: 3600
//! metrics: [bias, rmse]
//! ```
//!
//! Supports environment variable substitution using `${VAR}` and
//! `${VAR:-default}` syntax. Relative filenames resolve against the
//! directory of the configuration file unless `relative_path: false`.

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use skill_common::{ItemRef, Quantity, SkillResult};
use timeseries::DuplicatePolicy;

// ============================================================================
// Entries
// ============================================================================

/// Whether an entry is a fixed station or a moving track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    #[default]
    Point,
    Track,
}

/// Fields shared by model and observation entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceEntry {
    pub filename: String,
    pub item: Option<ItemRef>,
    #[serde(default = "default_true")]
    pub include: bool,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub x_item: Option<ItemRef>,
    pub y_item: Option<ItemRef>,
    pub quantity: Option<Quantity>,
    #[serde(default)]
    pub aux_items: Vec<ItemRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelEntry {
    #[serde(flatten)]
    pub source: SourceEntry,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObservationEntry {
    #[serde(flatten)]
    pub source: SourceEntry,
    pub keep_duplicates: Option<KeepDuplicates>,
    pub weight: Option<f64>,
}

/// `keep_duplicates` as written: `first`, `last`, `offset`, or a boolean.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum KeepDuplicates {
    Flag(bool),
    Policy(String),
}

impl KeepDuplicates {
    pub fn to_policy(&self) -> SkillResult<DuplicatePolicy> {
        match self {
            KeepDuplicates::Flag(false) => Ok(DuplicatePolicy::DropAll),
            KeepDuplicates::Flag(true) => Ok(DuplicatePolicy::KeepFirst),
            KeepDuplicates::Policy(s) => s.parse(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Runner configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunnerConfig {
    #[serde(deserialize_with = "ordered_entries")]
    pub modelresults: Vec<(String, ModelEntry)>,
    #[serde(deserialize_with = "ordered_entries")]
    pub observations: Vec<(String, ObservationEntry)>,
    #[serde(default = "default_true")]
    pub relative_path: bool,
    /// Seconds.
    pub max_model_gap: Option<f64>,
    pub metrics: Option<Vec<String>>,
}

impl RunnerConfig {
    /// Model entries with `include` set.
    pub fn included_models(&self) -> impl Iterator<Item = (&str, &ModelEntry)> {
        self.modelresults
            .iter()
            .filter(|(_, e)| e.source.include)
            .map(|(k, e)| (k.as_str(), e))
    }

    /// Observation entries with `include` set.
    pub fn included_observations(&self) -> impl Iterator<Item = (&str, &ObservationEntry)> {
        self.observations
            .iter()
            .filter(|(_, e)| e.source.include)
            .map(|(k, e)| (k.as_str(), e))
    }

    /// Rewrite relative filenames against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |source: &mut SourceEntry| {
            let path = Path::new(&source.filename);
            if path.is_relative() {
                source.filename = base.join(path).to_string_lossy().into_owned();
            }
        };
        self.modelresults.iter_mut().for_each(|(_, e)| resolve(&mut e.source));
        self.observations.iter_mut().for_each(|(_, e)| resolve(&mut e.source));
    }
}

/// Mapping deserialized as a list of entries in file order.
fn ordered_entries<'de, D, T>(deserializer: D) -> std::result::Result<Vec<(String, T)>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct EntriesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
        type Value = Vec<(String, T)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of entry name to entry")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, T>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor(PhantomData))
}

// ============================================================================
// Loading
// ============================================================================

/// Parse configuration text after environment variable expansion.
pub fn parse_config(content: &str) -> Result<RunnerConfig> {
    let expanded = expand_env_vars(content)?;
    let config: RunnerConfig =
        serde_yaml::from_str(&expanded).with_context(|| "Failed to parse skill configuration YAML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load a configuration file. Relative filenames are resolved against the
/// file's directory when `relative_path` is set and `absolute_paths` is not.
pub fn load_config<P: AsRef<Path>>(path: P, absolute_paths: bool) -> Result<RunnerConfig> {
    let path = path.as_ref();
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read skill configuration from {path:?}"))?;
    let mut config = parse_config(&content).with_context(|| format!("Invalid configuration {path:?}"))?;

    if config.relative_path && !absolute_paths {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        config.resolve_paths(&base);
    }
    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand `${VAR}` and `${VAR:-default}` in configuration text.
///
/// Substitution is line by line so errors can name the offending line. A
/// `$` not followed by `{` is kept as written.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut expanded = String::with_capacity(content.len());
    for (lineno, line) in content.split_inclusive('\n').enumerate() {
        let mut rest = line;
        while let Some(start) = rest.find("${") {
            expanded.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .with_context(|| format!("line {}: unclosed '${{' in {:?}", lineno + 1, line.trim_end()))?;
            let value = lookup_var(&after[..end]).with_context(|| format!("line {}", lineno + 1))?;
            expanded.push_str(&value);
            rest = &after[end + 1..];
        }
        expanded.push_str(rest);
    }
    Ok(expanded)
}

/// Value of `VAR` or `VAR:-default`. An empty variable takes the default.
fn lookup_var(expr: &str) -> Result<String> {
    let (name, default) = match expr.split_once(":-") {
        Some((name, default)) => (name.trim(), Some(default)),
        None => (expr.trim(), None),
    };
    anyhow::ensure!(!name.is_empty(), "empty variable name in '${{{expr}}}'");
    match (std::env::var(name).ok().filter(|v| !v.is_empty()), default) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => anyhow::bail!("environment variable {name} is not set"),
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_config(config: &RunnerConfig) -> Result<()> {
    anyhow::ensure!(
        config.included_models().next().is_some(),
        "Configuration must include at least one model result"
    );
    anyhow::ensure!(
        config.included_observations().next().is_some(),
        "Configuration must include at least one observation"
    );

    for (name, entry) in &config.modelresults {
        validate_source(name, &entry.source)?;
    }
    for (name, entry) in &config.observations {
        validate_source(name, &entry.source)?;
        if let Some(keep) = &entry.keep_duplicates {
            keep.to_policy().with_context(|| format!("Observation '{name}'"))?;
        }
        if let Some(w) = entry.weight {
            anyhow::ensure!(
                w.is_finite() && w >= 0.0,
                "Observation '{name}': weight must be a non-negative number, got {w}"
            );
        }
    }

    if let Some(gap) = config.max_model_gap {
        anyhow::ensure!(gap >= 0.0, "max_model_gap must be non-negative, got {gap}");
    }
    Ok(())
}

fn validate_source(name: &str, source: &SourceEntry) -> Result<()> {
    anyhow::ensure!(!source.filename.is_empty(), "Entry '{name}': filename cannot be empty");
    if source.kind == EntryKind::Track {
        anyhow::ensure!(
            source.x.is_none() && source.y.is_none(),
            "Entry '{name}': track entries take positions from x_item/y_item, not x/y"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
modelresults:
  SW_2:
    filename: sw2.csv
    item: 0
  SW_1:
    filename: /data/sw1.csv
    item: HKNA
observations:
  HKNA:
    filename: obs/hkna.csv
    x: 4.24
    y: 52.0
    weight: 2.0
  c2:
    filename: obs/c2.csv
    type: track
    include: false
max_model_gap: 3600
"#;

    #[test]
    fn test_parse_keeps_entry_order() {
        let config = parse_config(CONFIG).unwrap();
        let names: Vec<&str> = config.modelresults.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["SW_2", "SW_1"]);
        assert_eq!(config.modelresults[0].1.source.item, Some(ItemRef::Index(0)));
        assert_eq!(config.modelresults[1].1.source.item, Some(ItemRef::Name("HKNA".to_string())));
        assert_eq!(config.max_model_gap, Some(3600.0));
        assert!(config.relative_path);
    }

    #[test]
    fn test_include_false_is_skipped() {
        let config = parse_config(CONFIG).unwrap();
        let obs: Vec<&str> = config.included_observations().map(|(k, _)| k).collect();
        assert_eq!(obs, vec!["HKNA"]);
        assert_eq!(config.observations[1].1.source.kind, EntryKind::Track);
    }

    #[test]
    fn test_relative_paths_resolved_against_base() {
        let mut config = parse_config(CONFIG).unwrap();
        config.resolve_paths(Path::new("/cfg"));
        assert_eq!(config.modelresults[0].1.source.filename, "/cfg/sw2.csv");
        assert_eq!(config.modelresults[1].1.source.filename, "/data/sw1.csv");
        assert_eq!(config.observations[0].1.source.filename, "/cfg/obs/hkna.csv");
    }

    #[test]
    fn test_missing_observations_rejected() {
        let err = parse_config("modelresults:\n  m:\n    filename: m.csv\n").unwrap_err();
        assert!(format!("{err:#}").contains("observations"));
    }

    #[test]
    fn test_track_with_fixed_position_rejected() {
        let text = "modelresults:\n  m:\n    filename: m.csv\nobservations:\n  t:\n    filename: t.csv\n    type: track\n    x: 1.0\n";
        assert!(parse_config(text).is_err());
    }

    #[test]
    fn test_keep_duplicates_accepts_bool_and_name() {
        let text = "modelresults:\n  m:\n    filename: m.csv\nobservations:\n  a:\n    filename: a.csv\n    keep_duplicates: false\n  b:\n    filename: b.csv\n    keep_duplicates: last\n";
        let config = parse_config(text).unwrap();
        let policies: Vec<DuplicatePolicy> = config
            .observations
            .iter()
            .map(|(_, e)| e.keep_duplicates.as_ref().unwrap().to_policy().unwrap())
            .collect();
        assert_eq!(policies, vec![DuplicatePolicy::DropAll, DuplicatePolicy::KeepLast]);
    }

    #[test]
    fn test_env_var_default() {
        let expanded = expand_env_vars("dir: ${SKILL_RUNNER_UNSET_DIR:-obs}/a.csv").unwrap();
        assert_eq!(expanded, "dir: obs/a.csv");
        assert!(expand_env_vars("dir: ${SKILL_RUNNER_UNSET_DIR").is_err());
        assert!(expand_env_vars("dir: ${SKILL_RUNNER_UNSET_DIR}").is_err());
    }

    #[test]
    fn test_env_var_set_and_error_line() {
        std::env::set_var("SKILL_RUNNER_TEST_GAP", "600");
        let text = "max_model_gap: ${SKILL_RUNNER_TEST_GAP}\nmetrics: [$bias]\n";
        assert_eq!(expand_env_vars(text).unwrap(), "max_model_gap: 600\nmetrics: [$bias]\n");

        let err = expand_env_vars("a: 1\nb: ${SKILL_RUNNER_UNSET_OTHER}\n").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("line 2"), "{message}");
        assert!(message.contains("SKILL_RUNNER_UNSET_OTHER"), "{message}");
    }
}
