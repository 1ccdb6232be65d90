//! Skill metrics comparing model values with observed values.
//!
//! Every metric takes `(obs, model)` slices of equal length without missing
//! values and returns a single number. Empty input gives NaN.
//!
//! Metrics are looked up by name:
//!
//! ```ignore
//! let m = Metric::from_name("rmse")?;
//! let value = m.compute(&obs, &model);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use skill_common::{SkillError, SkillResult};

use crate::options;

/// Signature shared by all metric functions.
pub type MetricFn = fn(obs: &[f64], model: &[f64]) -> f64;

/// A named metric function.
#[derive(Clone)]
pub struct Metric {
    name: String,
    func: MetricFn,
}

const BUILTIN: &[(&str, MetricFn)] = &[
    ("bias", bias),
    ("max_error", max_error),
    ("rmse", rmse),
    ("urmse", urmse),
    ("mae", mae),
    ("mape", mape),
    ("nse", nse),
    ("mef", nse),
    ("kge", kge),
    ("r2", r2),
    ("cc", corrcoef),
    ("spearmanr", spearmanr),
    ("rho", spearmanr),
    ("si", scatter_index),
    ("ev", explained_variance),
    ("willmott", willmott),
    ("lin_slope", lin_slope),
    ("c_bias", c_bias),
    ("c_max_error", c_max_error),
    ("c_mae", c_mae),
    ("c_rmse", c_rmse),
    ("c_urmse", c_urmse),
];

impl Metric {
    /// Look up a built-in metric.
    pub fn from_name(name: &str) -> SkillResult<Self> {
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, f)| Metric {
                name: n.to_string(),
                func: *f,
            })
            .ok_or_else(|| {
                SkillError::invalid_value(format!(
                    "unknown metric '{name}'. Valid metrics: {:?}",
                    metric_names()
                ))
            })
    }

    /// A user-supplied metric.
    pub fn custom(name: impl Into<String>, func: MetricFn) -> Self {
        Metric {
            name: name.into(),
            func,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compute(&self, obs: &[f64], model: &[f64]) -> f64 {
        (self.func)(obs, model)
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Metric").field(&self.name).finish()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for Metric {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl FromStr for Metric {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::from_name(s.trim())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Metric::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// Names of all built-in metrics.
pub fn metric_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|(n, _)| *n).collect()
}

pub fn is_known_metric(name: &str) -> bool {
    BUILTIN.iter().any(|(n, _)| *n == name)
}

/// Parse a comma separated list such as "bias,rmse,cc".
pub fn parse_metric_list(s: &str) -> SkillResult<Vec<Metric>> {
    s.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(Metric::from_name)
        .collect()
}

/// The metrics to compute: the given ones, or the configured defaults.
pub fn resolve_metrics(metrics: Option<&[Metric]>, directional: bool) -> SkillResult<Vec<Metric>> {
    match metrics {
        Some(list) if !list.is_empty() => Ok(list.to_vec()),
        _ => default_metrics(directional),
    }
}

/// Default metrics from the options registry.
pub fn default_metrics(directional: bool) -> SkillResult<Vec<Metric>> {
    let names = if directional {
        options::directional_metrics_list()?
    } else {
        options::metrics_list()?
    };
    names.iter().map(|n| Metric::from_name(n)).collect()
}

// ============================================================================
// Helpers
// ============================================================================

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn residuals(obs: &[f64], model: &[f64]) -> Vec<f64> {
    model.iter().zip(obs).map(|(m, o)| m - o).collect()
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    let mu = mean(values);
    (values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 {
        return f64::NAN;
    }
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (x, y) in a.iter().zip(b) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    cov / (va * vb).sqrt()
}

/// Ranks starting at 1 with ties given their average rank.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = rank;
        }
        i = j + 1;
    }
    ranks
}

/// Wrap an angle difference in degrees to [-180, 180).
fn wrap_degrees(d: f64) -> f64 {
    (d + 180.0).rem_euclid(360.0) - 180.0
}

/// Circular mean in degrees, in (-180, 180].
fn circmean_degrees(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let (s, c) = values.iter().fold((0.0_f64, 0.0_f64), |(s, c), v| {
        let r = v.to_radians();
        (s + r.sin(), c + r.cos())
    });
    s.atan2(c).to_degrees()
}

// ============================================================================
// Metrics
// ============================================================================

/// Mean of model minus observation.
pub fn bias(obs: &[f64], model: &[f64]) -> f64 {
    mean(&residuals(obs, model))
}

/// Largest absolute residual.
pub fn max_error(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    residuals(obs, model).iter().fold(0.0_f64, |acc, r| acc.max(r.abs()))
}

/// Root mean squared error.
pub fn rmse(obs: &[f64], model: &[f64]) -> f64 {
    let r = residuals(obs, model);
    mean(&r.iter().map(|v| v * v).collect::<Vec<_>>()).sqrt()
}

/// Root mean squared error after removing the bias.
pub fn urmse(obs: &[f64], model: &[f64]) -> f64 {
    let r = residuals(obs, model);
    let b = mean(&r);
    mean(&r.iter().map(|v| (v - b).powi(2)).collect::<Vec<_>>()).sqrt()
}

/// Mean absolute error.
pub fn mae(obs: &[f64], model: &[f64]) -> f64 {
    mean(&residuals(obs, model).iter().map(|v| v.abs()).collect::<Vec<_>>())
}

/// Mean absolute percentage error. NaN when any observation is zero.
pub fn mape(obs: &[f64], model: &[f64]) -> f64 {
    if obs.iter().any(|o| *o == 0.0) {
        return f64::NAN;
    }
    let rel: Vec<f64> = obs.iter().zip(model).map(|(o, m)| ((m - o) / o).abs()).collect();
    100.0 * mean(&rel)
}

/// Nash-Sutcliffe efficiency.
pub fn nse(obs: &[f64], model: &[f64]) -> f64 {
    r2(obs, model)
}

/// Coefficient of determination, 1 - SS_res / SS_tot.
pub fn r2(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    let mo = mean(obs);
    let ss_res: f64 = obs.iter().zip(model).map(|(o, m)| (o - m).powi(2)).sum();
    let ss_tot: f64 = obs.iter().map(|o| (o - mo).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Kling-Gupta efficiency.
pub fn kge(obs: &[f64], model: &[f64]) -> f64 {
    let r = pearson(obs, model);
    let alpha = std_dev(model) / std_dev(obs);
    let beta = mean(model) / mean(obs);
    1.0 - ((r - 1.0).powi(2) + (alpha - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt()
}

/// Pearson correlation coefficient.
pub fn corrcoef(obs: &[f64], model: &[f64]) -> f64 {
    pearson(obs, model)
}

/// Spearman rank correlation.
pub fn spearmanr(obs: &[f64], model: &[f64]) -> f64 {
    pearson(&ranks(obs), &ranks(model))
}

/// Scatter index: unbiased residual norm relative to the observation norm.
pub fn scatter_index(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    let (mo, mm) = (mean(obs), mean(model));
    let num: f64 = obs
        .iter()
        .zip(model)
        .map(|(o, m)| (o - m - (mo - mm)).powi(2))
        .sum();
    let den: f64 = obs.iter().map(|o| o * o).sum();
    (num / den).sqrt()
}

/// Explained variance.
pub fn explained_variance(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    let diff: Vec<f64> = obs.iter().zip(model).map(|(o, m)| o - m).collect();
    let md = mean(&diff);
    let mo = mean(obs);
    let num: f64 = diff.iter().map(|d| (d - md).powi(2)).sum();
    let den: f64 = obs.iter().map(|o| (o - mo).powi(2)).sum();
    1.0 - num / den
}

/// Willmott's index of agreement.
pub fn willmott(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    let mo = mean(obs);
    let num: f64 = obs.iter().zip(model).map(|(o, m)| (o - m).powi(2)).sum();
    let den: f64 = obs
        .iter()
        .zip(model)
        .map(|(o, m)| ((m - mo).abs() + (o - mo).abs()).powi(2))
        .sum();
    1.0 - num / den
}

/// Slope of the least squares line of model on observation.
pub fn lin_slope(obs: &[f64], model: &[f64]) -> f64 {
    if obs.len() < 2 {
        return f64::NAN;
    }
    let (mo, mm) = (mean(obs), mean(model));
    let cov: f64 = obs.iter().zip(model).map(|(o, m)| (o - mo) * (m - mm)).sum();
    let var: f64 = obs.iter().map(|o| (o - mo).powi(2)).sum();
    cov / var
}

fn wrapped_residuals(obs: &[f64], model: &[f64]) -> Vec<f64> {
    residuals(obs, model).into_iter().map(wrap_degrees).collect()
}

/// Circular bias in degrees.
pub fn c_bias(obs: &[f64], model: &[f64]) -> f64 {
    circmean_degrees(&wrapped_residuals(obs, model))
}

/// Largest absolute circular residual in degrees.
pub fn c_max_error(obs: &[f64], model: &[f64]) -> f64 {
    if obs.is_empty() {
        return f64::NAN;
    }
    wrapped_residuals(obs, model).iter().fold(0.0_f64, |acc, r| acc.max(r.abs()))
}

/// Circular mean absolute error in degrees.
pub fn c_mae(obs: &[f64], model: &[f64]) -> f64 {
    mean(&wrapped_residuals(obs, model).iter().map(|r| r.abs()).collect::<Vec<_>>())
}

/// Circular root mean squared error in degrees.
pub fn c_rmse(obs: &[f64], model: &[f64]) -> f64 {
    mean(&wrapped_residuals(obs, model).iter().map(|r| r * r).collect::<Vec<_>>()).sqrt()
}

/// Circular unbiased root mean squared error in degrees.
pub fn c_urmse(obs: &[f64], model: &[f64]) -> f64 {
    let resi = wrapped_residuals(obs, model);
    let cm = circmean_degrees(&resi);
    mean(&resi.iter().map(|r| wrap_degrees(r - cm).powi(2)).collect::<Vec<_>>()).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, fixtures::matched};

    fn reference() -> (Vec<f64>, Vec<f64>) {
        (matched::OBSERVATION[..5].to_vec(), matched::M1[..5].to_vec())
    }

    #[test]
    fn test_lookup_and_aliases() {
        assert_eq!(Metric::from_name("rmse").unwrap().name(), "rmse");
        assert_eq!(Metric::from_name("mef").unwrap().name(), "mef");
        assert!(Metric::from_name("peak_ratio").is_err());
        let list = parse_metric_list("bias, rmse,cc").unwrap();
        assert_eq!(list.iter().map(Metric::name).collect::<Vec<_>>(), vec!["bias", "rmse", "cc"]);
    }

    #[test]
    fn test_reference_values() {
        let (obs, model) = reference();
        // residuals 0.5 0.4 0.6 0.9 0.6
        assert_approx_eq!(bias(&obs, &model), 0.6, 1e-12);
        assert_approx_eq!(rmse(&obs, &model), matched::RMSE_M1, 1e-12);
        assert_approx_eq!(max_error(&obs, &model), 0.9, 1e-12);
        assert_approx_eq!(mae(&obs, &model), 0.6, 1e-12);
        assert_approx_eq!(urmse(&obs, &model), (0.14_f64 / 5.0).sqrt(), 1e-12);
        assert_approx_eq!(lin_slope(&obs, &model), 1.07, 1e-12);
    }

    #[test]
    fn test_perfect_model() {
        let obs = [1.0, 2.0, 3.0, 4.0];
        assert_approx_eq!(rmse(&obs, &obs), 0.0, 1e-15);
        assert_approx_eq!(r2(&obs, &obs), 1.0, 1e-15);
        assert_approx_eq!(corrcoef(&obs, &obs), 1.0, 1e-12);
        assert_approx_eq!(kge(&obs, &obs), 1.0, 1e-12);
        assert_approx_eq!(willmott(&obs, &obs), 1.0, 1e-15);
        assert_approx_eq!(explained_variance(&obs, &obs), 1.0, 1e-15);
        assert_approx_eq!(scatter_index(&obs, &obs), 0.0, 1e-15);
    }

    #[test]
    fn test_spearman_with_ties() {
        let obs = [1.0, 2.0, 2.0, 3.0];
        let model = [10.0, 20.0, 20.0, 30.0];
        assert_approx_eq!(spearmanr(&obs, &model), 1.0, 1e-12);
        assert_eq!(ranks(&obs), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn test_mape_zero_observation() {
        assert!(mape(&[0.0, 1.0], &[1.0, 1.0]).is_nan());
        assert_approx_eq!(mape(&[2.0, 4.0], &[3.0, 3.0]), 37.5, 1e-12);
    }

    #[test]
    fn test_empty_input_is_nan() {
        for (_, f) in BUILTIN {
            assert!(f(&[], &[]).is_nan());
        }
    }

    #[test]
    fn test_circular_metrics_wrap() {
        let obs = [350.0, 10.0];
        let model = [10.0, 350.0];
        // residuals +20 and -20 after wrapping
        assert_approx_eq!(c_bias(&obs, &model), 0.0, 1e-9);
        assert_approx_eq!(c_max_error(&obs, &model), 20.0, 1e-9);
        assert_approx_eq!(c_mae(&obs, &model), 20.0, 1e-9);
        assert_approx_eq!(c_rmse(&obs, &model), 20.0, 1e-9);
        assert_approx_eq!(c_urmse(&obs, &model), 20.0, 1e-9);
    }

    #[test]
    fn test_custom_metric() {
        fn n_over(obs: &[f64], _model: &[f64]) -> f64 {
            obs.iter().filter(|o| **o > 2.0).count() as f64
        }
        let m = Metric::custom("n_over", n_over);
        assert_eq!(m.compute(&[1.0, 3.0, 4.0], &[0.0; 3]), 2.0);
    }

    #[test]
    fn test_serde_by_name() {
        let m = Metric::from_name("cc").unwrap();
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"cc\"");
        let back: Metric = serde_json::from_str("\"willmott\"").unwrap();
        assert_eq!(back.name(), "willmott");
    }
}
