//! Process-wide options registry.
//!
//! Options are registered once with a default value and a validator. Reads
//! and writes go through [`get_option`] and [`set_option`]; every write is
//! validated before it is stored.
//!
//! Built-in keys registered here:
//! - `skill.n_min`: default minimum number of points per gridded-skill cell
//! - `plot.colors`: default color cycle for models
//!
//! Downstream crates register their own keys with [`register_option`].

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SkillError, SkillResult};

/// Value stored under an option key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Validator run on every write.
pub type Validator = fn(&OptionValue) -> SkillResult<()>;

struct OptionEntry {
    default: OptionValue,
    current: OptionValue,
    validator: Validator,
    doc: &'static str,
}

static REGISTRY: Lazy<RwLock<BTreeMap<String, OptionEntry>>> = Lazy::new(|| {
    let mut map = BTreeMap::new();
    map.insert(
        "skill.n_min".to_string(),
        OptionEntry {
            default: OptionValue::None,
            current: OptionValue::None,
            validator: validate_optional_count,
            doc: "Minimum number of points in a gridded skill cell; None disables masking.",
        },
    );
    let colors = OptionValue::List(
        [
            "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2",
            "#7f7f7f", "#bcbd22", "#17becf",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    );
    map.insert(
        "plot.colors".to_string(),
        OptionEntry {
            default: colors.clone(),
            current: colors,
            validator: validate_string_list,
            doc: "Default color cycle for model results.",
        },
    );
    RwLock::new(map)
});

/// Register a new option, or replace the validator and default of an existing one.
///
/// If the key already exists and its current value passes the new validator,
/// the current value is kept.
pub fn register_option(key: &str, default: OptionValue, validator: Validator, doc: &'static str) -> SkillResult<()> {
    validator(&default)?;
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    let current = match registry.remove(key) {
        Some(existing) if validator(&existing.current).is_ok() => existing.current,
        _ => default.clone(),
    };
    registry.insert(
        key.to_string(),
        OptionEntry {
            default,
            current,
            validator,
            doc,
        },
    );
    Ok(())
}

/// Read an option value.
pub fn get_option(key: &str) -> SkillResult<OptionValue> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .get(key)
        .map(|entry| entry.current.clone())
        .ok_or_else(|| unknown_key(key, &registry))
}

/// Validate and store an option value.
pub fn set_option(key: &str, value: OptionValue) -> SkillResult<()> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if !registry.contains_key(key) {
        return Err(unknown_key(key, &registry));
    }
    if let Some(entry) = registry.get_mut(key) {
        (entry.validator)(&value)?;
        debug!(key, value = ?value, "option set");
        entry.current = value;
    }
    Ok(())
}

/// Restore the registered default of one option.
pub fn reset_option(key: &str) -> SkillResult<()> {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    match registry.get_mut(key) {
        Some(entry) => {
            entry.current = entry.default.clone();
            debug!(key, "option reset");
            Ok(())
        }
        None => Err(SkillError::not_found(format!("unknown option '{key}'"))),
    }
}

/// Snapshot of all options as (key, value, doc).
pub fn describe_options() -> Vec<(String, OptionValue, &'static str)> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .iter()
        .map(|(k, e)| (k.clone(), e.current.clone(), e.doc))
        .collect()
}

fn unknown_key(key: &str, registry: &BTreeMap<String, OptionEntry>) -> SkillError {
    let valid: Vec<&String> = registry.keys().collect();
    SkillError::not_found(format!("unknown option '{key}'. Valid options: {valid:?}"))
}

/// Accepts None or a positive integer.
pub fn validate_optional_count(value: &OptionValue) -> SkillResult<()> {
    match value {
        OptionValue::None => Ok(()),
        OptionValue::Int(n) if *n > 0 => Ok(()),
        other => Err(SkillError::invalid_value(format!(
            "expected None or a positive integer, got {other:?}"
        ))),
    }
}

/// Accepts a non-empty list of strings.
pub fn validate_string_list(value: &OptionValue) -> SkillResult<()> {
    match value {
        OptionValue::List(items) if !items.is_empty() => Ok(()),
        other => Err(SkillError::invalid_value(format!(
            "expected a non-empty list of strings, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_reset_n_min() {
        set_option("skill.n_min", OptionValue::Int(5)).unwrap();
        assert_eq!(get_option("skill.n_min").unwrap(), OptionValue::Int(5));
        assert!(set_option("skill.n_min", OptionValue::Int(-1)).is_err());
        assert_eq!(get_option("skill.n_min").unwrap(), OptionValue::Int(5));
        reset_option("skill.n_min").unwrap();
        assert_eq!(get_option("skill.n_min").unwrap(), OptionValue::None);
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(get_option("plot.nonsense"), Err(SkillError::NotFound(_))));
        assert!(set_option("plot.nonsense", OptionValue::Bool(true)).is_err());
    }

    #[test]
    fn test_register_keeps_valid_current() {
        register_option("test.flag", OptionValue::Bool(false), |_| Ok(()), "test flag").unwrap();
        set_option("test.flag", OptionValue::Bool(true)).unwrap();
        register_option("test.flag", OptionValue::Bool(false), |_| Ok(()), "test flag").unwrap();
        assert_eq!(get_option("test.flag").unwrap(), OptionValue::Bool(true));
    }
}
