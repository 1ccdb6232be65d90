//! Metric options in the process-wide registry.
//!
//! Registers `metrics.list` and `metrics.directional_list` on first use. The
//! wrappers here make sure the keys exist before delegating to
//! [`skill_common::options`].

use once_cell::sync::OnceCell;
use skill_common::options as registry;
use skill_common::{OptionValue, SkillError, SkillResult};

use crate::metrics::is_known_metric;

pub const METRICS_LIST: &str = "metrics.list";
pub const DIRECTIONAL_METRICS_LIST: &str = "metrics.directional_list";

const DEFAULT_METRICS: [&str; 7] = ["bias", "rmse", "urmse", "mae", "cc", "si", "r2"];
const DEFAULT_DIRECTIONAL_METRICS: [&str; 4] = ["c_bias", "c_rmse", "c_urmse", "c_max_error"];

static REGISTERED: OnceCell<()> = OnceCell::new();

fn string_list(names: &[&str]) -> OptionValue {
    OptionValue::List(names.iter().map(|n| n.to_string()).collect())
}

fn validate_metric_list(value: &OptionValue) -> SkillResult<()> {
    registry::validate_string_list(value)?;
    if let Some(names) = value.as_list() {
        if let Some(bad) = names.iter().find(|n| !is_known_metric(n)) {
            return Err(SkillError::invalid_value(format!("unknown metric '{bad}' in metric list")));
        }
    }
    Ok(())
}

/// Register the metric keys once per process.
pub fn ensure_registered() -> SkillResult<()> {
    REGISTERED
        .get_or_try_init(|| {
            registry::register_option(
                METRICS_LIST,
                string_list(&DEFAULT_METRICS),
                validate_metric_list,
                "Default metrics for skill assessment.",
            )?;
            registry::register_option(
                DIRECTIONAL_METRICS_LIST,
                string_list(&DEFAULT_DIRECTIONAL_METRICS),
                validate_metric_list,
                "Default metrics for directional quantities.",
            )
        })
        .map(|_| ())
}

pub fn get_option(key: &str) -> SkillResult<OptionValue> {
    ensure_registered()?;
    registry::get_option(key)
}

pub fn set_option(key: &str, value: OptionValue) -> SkillResult<()> {
    ensure_registered()?;
    registry::set_option(key, value)
}

pub fn reset_option(key: &str) -> SkillResult<()> {
    ensure_registered()?;
    registry::reset_option(key)
}

/// Snapshot of every registered option as (key, value, doc).
pub fn options() -> SkillResult<Vec<(String, OptionValue, &'static str)>> {
    ensure_registered()?;
    Ok(registry::describe_options())
}

fn list_option(key: &str) -> SkillResult<Vec<String>> {
    match get_option(key)? {
        OptionValue::List(names) => Ok(names),
        other => Err(SkillError::invalid_value(format!("option '{key}' is not a list: {other:?}"))),
    }
}

pub fn metrics_list() -> SkillResult<Vec<String>> {
    list_option(METRICS_LIST)
}

pub fn directional_metrics_list() -> SkillResult<Vec<String>> {
    list_option(DIRECTIONAL_METRICS_LIST)
}

/// Default minimum count per gridded skill cell.
pub fn default_n_min() -> SkillResult<Option<usize>> {
    Ok(registry::get_option("skill.n_min")?
        .as_int()
        .map(|n| n.max(0) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let names = metrics_list().unwrap();
        assert_eq!(names, DEFAULT_METRICS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert!(directional_metrics_list().unwrap().contains(&"c_rmse".to_string()));
        assert!(options().unwrap().iter().any(|(k, _, _)| k == METRICS_LIST));
    }

    #[test]
    fn test_invalid_metric_rejected() {
        let err = set_option(DIRECTIONAL_METRICS_LIST, string_list(&["c_rmse", "nonsense"]));
        assert!(err.is_err());
        assert!(set_option(DIRECTIONAL_METRICS_LIST, OptionValue::Int(3)).is_err());
        assert!(directional_metrics_list().unwrap().contains(&"c_bias".to_string()));
    }
}
