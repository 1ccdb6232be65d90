//! Collections of comparers, one per observation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use skill_common::item::resolve_unique;
use skill_common::{ItemRef, SkillError, SkillResult};
use tracing::debug;

use crate::comparer::{BiasCorrection, Comparer, Concatenated, RowView, Selection};
use crate::gridded::{compute_gridded, default_gridded_by, GriddedSkillOptions, SkillGrid};
use crate::long_table::LongTable;
use crate::metrics::{resolve_metrics, Metric};
use crate::options::default_n_min;
use crate::persist;
use crate::skill::{compute_skill, default_group_by, GroupBy, KeyValue, SkillRow, SkillTable};

/// Weighting of observations in [`ComparerCollection::mean_skill`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MeanWeights {
    /// The weight attribute of each comparer.
    #[default]
    Comparer,
    Equal,
    /// Proportional to the number of matched points.
    Points,
    /// One weight per comparer, in collection order.
    Custom(Vec<f64>),
}

impl FromStr for MeanWeights {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "comparer" | "weight" => Ok(MeanWeights::Comparer),
            "equal" => Ok(MeanWeights::Equal),
            "points" | "n" => Ok(MeanWeights::Points),
            other => Err(SkillError::invalid_value(format!(
                "unknown weights '{other}', expected 'comparer', 'equal' or 'points'"
            ))),
        }
    }
}

/// Ordered comparers with unique observation names.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComparerCollection {
    comparers: Vec<Comparer>,
}

impl ComparerCollection {
    /// Comparers sharing an observation name are concatenated.
    pub fn new(comparers: Vec<Comparer>) -> SkillResult<Self> {
        let mut merged: Vec<Comparer> = Vec::with_capacity(comparers.len());
        for cmp in comparers {
            match merged.iter().position(|c| c.name() == cmp.name()) {
                Some(i) => match merged[i].concat(&cmp)? {
                    Concatenated::Comparer(c) => merged[i] = c,
                    Concatenated::Collection(_) => {
                        return Err(SkillError::invalid_value(format!(
                            "could not merge comparers named '{}'",
                            cmp.name()
                        )))
                    }
                },
                None => merged.push(cmp),
            }
        }
        Ok(Self { comparers: merged })
    }

    pub fn len(&self) -> usize {
        self.comparers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Comparer> {
        self.comparers.iter()
    }

    /// Comparer by observation name or position.
    pub fn get(&self, item: impl Into<ItemRef>) -> SkillResult<&Comparer> {
        let idx = item.into().resolve(&self.names())?;
        Ok(&self.comparers[idx])
    }

    pub fn names(&self) -> Vec<&str> {
        self.comparers.iter().map(Comparer::name).collect()
    }

    pub fn obs_names(&self) -> Vec<&str> {
        self.names()
    }

    /// Model names across all comparers, by first appearance.
    pub fn mod_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.comparers.iter().flat_map(Comparer::mod_names) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    pub fn n_models(&self) -> usize {
        self.mod_names().len()
    }

    /// Matched points summed over comparers.
    pub fn n_points(&self) -> usize {
        self.comparers.iter().map(Comparer::n_points).sum()
    }

    /// Long table of every comparer, in collection order.
    pub fn to_long_table(&self) -> LongTable {
        let mut table = LongTable::default();
        for cmp in &self.comparers {
            table.extend(cmp.to_long_table());
        }
        table
    }

    fn is_directional(&self) -> bool {
        self.comparers.first().is_some_and(|c| c.quantity().is_directional)
    }

    fn retain_non_empty(comparers: Vec<Comparer>) -> Self {
        Self {
            comparers: comparers.into_iter().filter(|c| c.n_points() > 0).collect(),
        }
    }

    // === Selection ===

    /// Apply `selection` to every comparer.
    ///
    /// Observations are picked at collection level. A comparer without any
    /// of the selected models is dropped, as is any comparer left empty.
    pub fn sel(&self, selection: &Selection) -> SkillResult<ComparerCollection> {
        let names = self.names();
        let picked: Vec<usize> = match &selection.observation {
            Some(obs) => resolve_unique(obs, &names)?,
            None => (0..self.len()).collect(),
        };
        let models: Option<Vec<String>> = match &selection.model {
            Some(refs) => {
                let all = self.mod_names();
                let idx = resolve_unique(refs, &all)?;
                Some(idx.into_iter().map(|i| all[i].to_string()).collect())
            }
            None => None,
        };

        let mut out = Vec::with_capacity(picked.len());
        for i in picked {
            let cmp = &self.comparers[i];
            let mut member = Selection {
                observation: None,
                model: None,
                ..selection.clone()
            };
            if let Some(models) = &models {
                let present: Vec<ItemRef> = models
                    .iter()
                    .filter(|m| cmp.mod_names().contains(&m.as_str()))
                    .map(ItemRef::from)
                    .collect();
                if present.is_empty() {
                    continue;
                }
                member.model = Some(present);
            }
            out.push(cmp.sel(&member)?);
        }
        let selected = Self::retain_non_empty(out);
        debug!(before = self.len(), after = selected.len(), "selected comparers");
        Ok(selected)
    }

    /// Keep rows where `mask` is true. The mask runs over the points of
    /// all comparers in collection order.
    pub fn where_mask(&self, mask: &[bool]) -> SkillResult<ComparerCollection> {
        if mask.len() != self.n_points() {
            return Err(SkillError::invalid_value(format!(
                "mask has {} values but the collection has {} points",
                mask.len(),
                self.n_points()
            )));
        }
        let mut offset = 0;
        let mut out = Vec::with_capacity(self.len());
        for cmp in &self.comparers {
            let n = cmp.n_points();
            out.push(cmp.where_mask(&mask[offset..offset + n])?);
            offset += n;
        }
        Ok(Self::retain_non_empty(out))
    }

    /// Keep rows where `cond` holds, in every comparer.
    pub fn where_fn<F>(&self, cond: F) -> ComparerCollection
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        Self::retain_non_empty(self.comparers.iter().map(|c| c.where_fn(&cond)).collect())
    }

    /// Run a query expression on every comparer.
    pub fn query(&self, expr: &str) -> SkillResult<ComparerCollection> {
        let out = self
            .comparers
            .iter()
            .map(|c| c.query(expr))
            .collect::<SkillResult<Vec<_>>>()?;
        Ok(Self::retain_non_empty(out))
    }

    // === Transformations ===

    /// Rename observations, models or auxiliary variables wherever they occur.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> SkillResult<ComparerCollection> {
        if let Some((old, _)) = mapping.iter().find(|(old, _)| {
            !self
                .comparers
                .iter()
                .any(|c| c.name() == *old || c.mod_names().contains(old) || c.aux_names().contains(old))
        }) {
            return Err(SkillError::not_found(format!("'{old}' is not found in any comparer")));
        }

        let mut out = Vec::with_capacity(self.len());
        for cmp in &self.comparers {
            let relevant: Vec<(&str, &str)> = mapping
                .iter()
                .filter(|(old, _)| {
                    cmp.name() == *old || cmp.mod_names().contains(old) || cmp.aux_names().contains(old)
                })
                .copied()
                .collect();
            out.push(cmp.rename(&relevant)?);
        }
        ComparerCollection::new(out)
    }

    pub fn remove_bias(&self, correct: BiasCorrection) -> SkillResult<ComparerCollection> {
        let comparers = self
            .comparers
            .iter()
            .map(|c| c.remove_bias(correct))
            .collect::<SkillResult<Vec<_>>>()?;
        Ok(Self { comparers })
    }

    /// Combine two collections, merging comparers of the same observation.
    pub fn concat(&self, other: &ComparerCollection) -> SkillResult<ComparerCollection> {
        ComparerCollection::new(self.comparers.iter().chain(other.iter()).cloned().collect())
    }

    /// Add one comparer, merging it with a comparer of the same observation.
    pub fn push(&self, cmp: Comparer) -> SkillResult<ComparerCollection> {
        let mut comparers = self.comparers.clone();
        comparers.push(cmp);
        ComparerCollection::new(comparers)
    }

    // === Skill ===

    /// Skill over all matched points, grouped by `by`.
    ///
    /// Without `by`, groups by model and observation, dropping a key that
    /// has a single value.
    pub fn skill(&self, by: Option<&[GroupBy]>, metrics: Option<&[Metric]>) -> SkillResult<SkillTable> {
        let table = self.to_long_table();
        if table.is_empty() {
            return Err(SkillError::no_data("No data selected for skill assessment"));
        }
        let by = by
            .map(<[GroupBy]>::to_vec)
            .unwrap_or_else(|| default_group_by(self.n_models(), self.len()));
        let metrics = resolve_metrics(metrics, self.is_directional())?;
        compute_skill(&table, &by, &metrics, self.n_models())
    }

    /// Per-model weighted mean of the per-observation skill.
    ///
    /// `n` is the total number of points. NaN scores are left out of the mean.
    pub fn mean_skill(&self, weights: &MeanWeights, metrics: Option<&[Metric]>) -> SkillResult<SkillTable> {
        if self.n_points() == 0 {
            return Err(SkillError::no_data("No data selected for skill assessment"));
        }
        let metrics = resolve_metrics(metrics, self.is_directional())?;
        let w = self.weights(weights)?;

        let rows = self
            .mod_names()
            .into_iter()
            .map(|model| {
                let mut n = 0;
                let mut sums = vec![(0.0, 0.0); metrics.len()];
                for (cmp, wi) in self.comparers.iter().zip(&w) {
                    let Ok(values) = cmp.mod_values(model) else {
                        continue;
                    };
                    n += cmp.n_points();
                    for (metric, (num, den)) in metrics.iter().zip(sums.iter_mut()) {
                        let v = metric.compute(cmp.obs_values(), values);
                        if !v.is_nan() {
                            *num += wi * v;
                            *den += wi;
                        }
                    }
                }
                SkillRow {
                    keys: vec![KeyValue::Label(model.to_string())],
                    n,
                    values: sums
                        .into_iter()
                        .map(|(num, den)| if den > 0.0 { num / den } else { f64::NAN })
                        .collect(),
                    x: f64::NAN,
                    y: f64::NAN,
                }
            })
            .collect();

        Ok(SkillTable::from_parts(
            vec!["model".to_string()],
            metrics.iter().map(|m| m.name().to_string()).collect(),
            Vec::new(),
            rows,
        ))
    }

    fn weights(&self, weights: &MeanWeights) -> SkillResult<Vec<f64>> {
        match weights {
            MeanWeights::Comparer => Ok(self.comparers.iter().map(Comparer::weight).collect()),
            MeanWeights::Equal => Ok(vec![1.0; self.len()]),
            MeanWeights::Points => Ok(self.comparers.iter().map(|c| c.n_points() as f64).collect()),
            MeanWeights::Custom(w) => {
                if w.len() != self.len() {
                    return Err(SkillError::invalid_value(format!(
                        "got {} weights for {} comparers",
                        w.len(),
                        self.len()
                    )));
                }
                if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(SkillError::invalid_value("weights must be finite and non-negative"));
                }
                Ok(w.clone())
            }
        }
    }

    /// One value per model: the comparer-weighted mean of the per-observation
    /// score. RMSE unless another metric is given.
    pub fn score(&self, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>> {
        let metric = match metric {
            Some(m) => m.clone(),
            None => Metric::from_name("rmse")?,
        };
        let table = self.mean_skill(&MeanWeights::Comparer, Some(std::slice::from_ref(&metric)))?;
        Ok(table
            .rows()
            .iter()
            .filter_map(|row| Some((row.keys[0].as_label()?.to_string(), row.values[0])))
            .collect())
    }

    /// Skill per spatial bin over all comparers.
    pub fn gridded_skill(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        let table = self.to_long_table();
        if table.is_empty() {
            return Err(SkillError::no_data("No data to compare"));
        }
        let by = options
            .by
            .clone()
            .unwrap_or_else(|| default_gridded_by(self.n_models(), self.len()));
        let metrics = resolve_metrics(options.metrics.as_deref(), self.is_directional())?;
        let n_min = match options.n_min {
            Some(n) => Some(n),
            None => default_n_min()?,
        };
        compute_gridded(&table, &by, &metrics, &options.bins, options.binsize, n_min)
    }

    // === Persistence ===

    pub fn save(&self, path: impl AsRef<Path>) -> SkillResult<()> {
        persist::save_collection(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> SkillResult<ComparerCollection> {
        persist::load_collection(path.as_ref())
    }
}

impl<'a> IntoIterator for &'a ComparerCollection {
    type Item = &'a Comparer;
    type IntoIter = std::slice::Iter<'a, Comparer>;

    fn into_iter(self) -> Self::IntoIter {
        self.comparers.iter()
    }
}

impl IntoIterator for ComparerCollection {
    type Item = Comparer;
    type IntoIter = std::vec::IntoIter<Comparer>;

    fn into_iter(self) -> Self::IntoIter {
        self.comparers.into_iter()
    }
}

impl fmt::Display for ComparerCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<ComparerCollection>")?;
        writeln!(f, "Comparers:")?;
        for (i, cmp) in self.comparers.iter().enumerate() {
            writeln!(f, "{i}: {} - {}", cmp.name(), cmp.quantity())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_common::{Attrs, Quantity};
    use test_utils::{assert_approx_eq, daily_times};
    use timeseries::{Coordinates, TimeSeries, VarKind, Variable};

    fn comparer(name: &str, start: &str, obs: Vec<f64>, models: &[(&str, Vec<f64>)], weight: f64) -> Comparer {
        let mut vars = vec![Variable::new("Observation", VarKind::Observation, obs.clone())];
        vars.extend(
            models
                .iter()
                .map(|(m, v)| Variable::new(*m, VarKind::Model, v.clone())),
        );
        let data = TimeSeries::new(
            name,
            daily_times(start, obs.len()),
            vars,
            Coordinates::fixed(Some(1.0), Some(2.0), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap();
        Comparer::new(data, Vec::new(), weight, "#d62728", Attrs::new()).unwrap()
    }

    fn collection() -> ComparerCollection {
        ComparerCollection::new(vec![
            comparer("A", "2019-01-01", vec![1.0, 2.0], &[("m1", vec![2.0, 3.0])], 1.0),
            comparer(
                "B",
                "2019-01-01",
                vec![1.0, 2.0, 3.0, 4.0],
                &[("m1", vec![1.0, 2.0, 3.0, 4.0]), ("m2", vec![2.0, 3.0, 4.0, 5.0])],
                3.0,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_same_name_is_concatenated() {
        let cc = ComparerCollection::new(vec![
            comparer("A", "2019-01-01", vec![1.0, 2.0], &[("m1", vec![1.0, 2.0])], 1.0),
            comparer("A", "2019-01-03", vec![3.0], &[("m1", vec![3.0])], 1.0),
        ])
        .unwrap();
        assert_eq!(cc.len(), 1);
        assert_eq!(cc.n_points(), 3);
    }

    #[test]
    fn test_names_and_lookup() {
        let cc = collection();
        assert_eq!(cc.names(), vec!["A", "B"]);
        assert_eq!(cc.mod_names(), vec!["m1", "m2"]);
        assert_eq!(cc.get("B").unwrap().n_points(), 4);
        assert_eq!(cc.get(-1).unwrap().name(), "B");
        assert!(matches!(cc.get("C"), Err(SkillError::NotFound(_))));
    }

    #[test]
    fn test_sel_model_drops_comparers_without_it() {
        let cc = collection().sel(&Selection::new().model("m2")).unwrap();
        assert_eq!(cc.names(), vec!["B"]);
        assert_eq!(cc.mod_names(), vec!["m2"]);
    }

    #[test]
    fn test_sel_observation_and_time() {
        let cc = collection();
        let one = cc.sel(&Selection::new().observation("A")).unwrap();
        assert_eq!(one.names(), vec!["A"]);

        let late = cc
            .sel(&Selection::new().start(test_utils::ts("2019-01-03")))
            .unwrap();
        assert_eq!(late.names(), vec!["B"]);
        assert_eq!(late.n_points(), 2);
    }

    #[test]
    fn test_where_mask_spans_members() {
        let cc = collection();
        let mask = vec![false, false, true, true, false, false];
        let out = cc.where_mask(&mask).unwrap();
        assert_eq!(out.names(), vec!["B"]);
        assert_eq!(out.n_points(), 2);
        assert!(cc.where_mask(&[true]).is_err());
    }

    #[test]
    fn test_mean_skill_weights() {
        let cc = collection();
        let bias = [Metric::from_name("bias").unwrap()];

        let equal = cc.mean_skill(&MeanWeights::Equal, Some(&bias)).unwrap();
        assert_approx_eq!(equal.get("model", "m1", "bias").unwrap(), 0.5, 1e-12);
        assert_eq!(equal.n(), vec![6, 4]);

        let points = cc.mean_skill(&MeanWeights::Points, Some(&bias)).unwrap();
        assert_approx_eq!(points.get("model", "m1", "bias").unwrap(), 1.0 / 3.0, 1e-12);

        let weighted = cc.mean_skill(&MeanWeights::Comparer, Some(&bias)).unwrap();
        assert_approx_eq!(weighted.get("model", "m1", "bias").unwrap(), 0.25, 1e-12);
        assert_approx_eq!(weighted.get("model", "m2", "bias").unwrap(), 1.0, 1e-12);
    }

    #[test]
    fn test_custom_weights_length_checked() {
        let err = collection().mean_skill(&MeanWeights::Custom(vec![1.0]), None).unwrap_err();
        assert!(matches!(err, SkillError::InvalidValue(_)));
    }

    #[test]
    fn test_score_is_weighted_mean() {
        let score = collection().score(None).unwrap();
        assert_approx_eq!(score["m1"], 0.25, 1e-12);
        assert_approx_eq!(score["m2"], 1.0, 1e-12);
    }

    #[test]
    fn test_skill_groups_by_model_and_observation() {
        let sk = collection().skill(None, None).unwrap();
        assert_eq!(sk.by(), ["model".to_string(), "observation".to_string()]);
        assert_eq!(sk.len(), 3);
        assert_eq!(sk.n(), vec![2, 4, 4]);
    }

    #[test]
    fn test_rename_unknown_is_error() {
        let cc = collection();
        let renamed = cc.rename(&[("m1", "model1")]).unwrap();
        assert_eq!(renamed.mod_names(), vec!["model1", "m2"]);
        assert!(cc.rename(&[("nope", "x")]).is_err());
    }

    #[test]
    fn test_weights_from_str() {
        assert_eq!("Equal".parse::<MeanWeights>().unwrap(), MeanWeights::Equal);
        assert!("median".parse::<MeanWeights>().is_err());
    }
}
