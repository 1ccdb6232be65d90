//! The matched observation/model dataset and its analysis methods.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDateTime;
use skill_common::attrs::validate_user_attrs;
use skill_common::item::resolve_unique;
use skill_common::{
    is_reserved_name, Area, Attrs, GeometryType, ItemRef, Quantity, SkillError, SkillResult, OBSERVATION_VAR,
};
use timeseries::{Coordinates, Observation, TimeSeries, VarKind, Variable};
use tracing::debug;

use crate::collection::ComparerCollection;
use crate::gridded::{compute_gridded, default_gridded_by, GriddedSkillOptions, SkillGrid};
use crate::long_table::LongTable;
use crate::matching::{match_space_time, MatchOptions};
use crate::metrics::{resolve_metrics, Metric};
use crate::options::default_n_min;
use crate::persist;
use crate::query::{Query, Value};
use crate::skill::{compute_skill, default_group_by, GroupBy, SkillTable};

// ============================================================================
// Selection
// ============================================================================

/// Time selection of [`Selection::time`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSelection {
    /// Rows at exactly this timestamp.
    At(NaiveDateTime),
    /// Rows with `start <= t <= end`.
    Range(NaiveDateTime, NaiveDateTime),
}

/// Filters for `sel`. Unset fields select everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub model: Option<Vec<ItemRef>>,
    pub observation: Option<Vec<ItemRef>>,
    pub time: Option<TimeSelection>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub area: Option<Area>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<ItemRef>) -> Self {
        self.model = Some(vec![model.into()]);
        self
    }

    pub fn models<I, T>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemRef>,
    {
        self.model = Some(models.into_iter().map(Into::into).collect());
        self
    }

    pub fn observation(mut self, observation: impl Into<ItemRef>) -> Self {
        self.observation = Some(vec![observation.into()]);
        self
    }

    pub fn observations<I, T>(mut self, observations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemRef>,
    {
        self.observation = Some(observations.into_iter().map(Into::into).collect());
        self
    }

    pub fn time(mut self, time: TimeSelection) -> Self {
        self.time = Some(time);
        self
    }

    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: NaiveDateTime) -> Self {
        self.end = Some(end);
        self
    }

    pub fn area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    fn validate(&self) -> SkillResult<()> {
        if self.time.is_some() && (self.start.is_some() || self.end.is_some()) {
            return Err(SkillError::invalid_value("time cannot be combined with start or end"));
        }
        Ok(())
    }
}

/// Which side absorbs the mean bias in [`Comparer::remove_bias`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiasCorrection {
    #[default]
    Model,
    Observation,
}

impl FromStr for BiasCorrection {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Model" | "model" => Ok(BiasCorrection::Model),
            "Observation" | "observation" => Ok(BiasCorrection::Observation),
            other => Err(SkillError::invalid_value(format!(
                "Unknown correct={other}. Only know 'Model' and 'Observation'"
            ))),
        }
    }
}

/// Result of concatenating two comparers.
#[derive(Debug, Clone)]
pub enum Concatenated {
    /// Both comparers belong to the same observation.
    Comparer(Comparer),
    /// Different observations.
    Collection(ComparerCollection),
}

/// Read access to one matched row, used by [`Comparer::where_fn`].
pub struct RowView<'a> {
    data: &'a TimeSeries,
    row: usize,
    x: f64,
    y: f64,
}

impl RowView<'_> {
    pub fn index(&self) -> usize {
        self.row
    }

    pub fn time(&self) -> NaiveDateTime {
        self.data.time()[self.row]
    }

    pub fn obs(&self) -> f64 {
        self.data.values()[self.row]
    }

    /// Value of a model or auxiliary variable.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.data.variable(name).map(|v| v.values[self.row])
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

// ============================================================================
// Comparer
// ============================================================================

/// An observation matched with one or more models.
///
/// `data` holds the `Observation` variable first, then one variable per
/// model, then auxiliary variables. Every row has valid observation and
/// model values. `raw_mod_data` keeps the extracted model series before
/// matching, one per model, in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparer {
    data: TimeSeries,
    raw_mod_data: Vec<(String, TimeSeries)>,
    weight: f64,
    color: String,
    attrs: Attrs,
}

fn raw_from_matched(data: &TimeSeries, model: &str) -> SkillResult<TimeSeries> {
    let mut raw = data.select_variables(&[model])?;
    raw.set_name(model)?;
    Ok(raw)
}

impl Comparer {
    /// Build from a matched dataset. Missing raw model series are taken
    /// from the matched data.
    pub fn new(
        data: TimeSeries,
        raw_mod_data: Vec<(String, TimeSeries)>,
        weight: f64,
        color: &str,
        attrs: Attrs,
    ) -> SkillResult<Self> {
        let primary = data.primary();
        if primary.name != OBSERVATION_VAR || primary.kind != VarKind::Observation {
            return Err(SkillError::invalid_value(format!(
                "matched data must start with the '{OBSERVATION_VAR}' variable, found '{}'",
                primary.name
            )));
        }
        let mod_names: Vec<String> = data
            .variables()
            .iter()
            .filter(|v| v.kind == VarKind::Model)
            .map(|v| v.name.clone())
            .collect();
        if mod_names.is_empty() {
            return Err(SkillError::invalid_value("matched data has no model variables"));
        }
        if let Some(v) = data.variables().iter().skip(1).find(|v| v.kind == VarKind::Observation) {
            return Err(SkillError::invalid_value(format!(
                "matched data has a second observation variable '{}'",
                v.name
            )));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(SkillError::invalid_value(format!(
                "weight must be a finite non-negative number, got {weight}"
            )));
        }
        validate_user_attrs(&attrs)?;
        if let Some((name, _)) = raw_mod_data.iter().find(|(n, _)| !mod_names.contains(n)) {
            return Err(SkillError::invalid_value(format!(
                "raw data for '{name}' has no matching model variable"
            )));
        }

        let mut raw_mod_data = raw_mod_data;
        let mut ordered = Vec::with_capacity(mod_names.len());
        for name in &mod_names {
            let series = match raw_mod_data.iter().position(|(n, _)| n == name) {
                Some(i) => raw_mod_data.swap_remove(i).1,
                None => raw_from_matched(&data, name)?,
            };
            ordered.push((name.clone(), series));
        }

        Ok(Self {
            data,
            raw_mod_data: ordered,
            weight,
            color: color.to_string(),
            attrs,
        })
    }

    // === Accessors ===

    pub fn name(&self) -> &str {
        self.data.name()
    }

    pub fn gtype(&self) -> GeometryType {
        self.data.gtype()
    }

    pub fn quantity(&self) -> &Quantity {
        self.data.quantity()
    }

    pub fn unit_text(&self) -> String {
        self.quantity().unit_text()
    }

    pub fn n_points(&self) -> usize {
        self.data.n_points()
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        self.data.time()
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.data.start_time()
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        self.data.end_time()
    }

    /// x per row; a point position is repeated.
    pub fn x(&self) -> Vec<f64> {
        self.data.coords().x_values(self.n_points())
    }

    /// y per row; a point position is repeated.
    pub fn y(&self) -> Vec<f64> {
        self.data.coords().y_values(self.n_points())
    }

    pub fn z(&self) -> Option<f64> {
        match self.data.coords() {
            Coordinates::Fixed { z, .. } => *z,
            Coordinates::Moving { .. } => None,
        }
    }

    pub fn coords(&self) -> &Coordinates {
        self.data.coords()
    }

    /// The matched dataset.
    pub fn data(&self) -> &TimeSeries {
        &self.data
    }

    /// Extracted model series before matching, in model order.
    pub fn raw_mod_data(&self) -> &[(String, TimeSeries)] {
        &self.raw_mod_data
    }

    pub fn mod_names(&self) -> Vec<&str> {
        self.data
            .variables()
            .iter()
            .filter(|v| v.kind == VarKind::Model)
            .map(|v| v.name.as_str())
            .collect()
    }

    pub fn n_models(&self) -> usize {
        self.mod_names().len()
    }

    pub fn aux_names(&self) -> Vec<&str> {
        self.data.aux_names()
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) -> SkillResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SkillError::invalid_value(format!(
                "weight must be a finite non-negative number, got {weight}"
            )));
        }
        self.weight = weight;
        Ok(())
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn obs_values(&self) -> &[f64] {
        self.data.values()
    }

    pub fn mod_values(&self, model: &str) -> SkillResult<&[f64]> {
        self.data
            .variables()
            .iter()
            .find(|v| v.kind == VarKind::Model && v.name == model)
            .map(|v| v.values.as_slice())
            .ok_or_else(|| SkillError::not_found(format!("model '{model}' in comparer '{}'", self.name())))
    }

    /// Model minus observation, indexed `[model][row]`.
    pub fn residual(&self) -> Vec<Vec<f64>> {
        let obs = self.obs_values();
        self.data
            .variables()
            .iter()
            .filter(|v| v.kind == VarKind::Model)
            .map(|v| v.values.iter().zip(obs).map(|(m, o)| m - o).collect())
            .collect()
    }

    /// One row per model and timestamp.
    pub fn to_long_table(&self) -> LongTable {
        let n = self.n_points();
        let (x, y) = (self.x(), self.y());
        let aux: Vec<(String, Vec<f64>)> = self
            .data
            .variables()
            .iter()
            .filter(|v| v.kind == VarKind::Auxiliary)
            .map(|v| (v.name.clone(), v.values.clone()))
            .collect();
        let mut table = LongTable::default();
        for var in self.data.variables().iter().filter(|v| v.kind == VarKind::Model) {
            table.extend(LongTable {
                model: vec![var.name.clone(); n],
                observation: vec![self.name().to_string(); n],
                time: self.time().to_vec(),
                x: x.clone(),
                y: y.clone(),
                obs_val: self.obs_values().to_vec(),
                mod_val: var.values.clone(),
                aux: aux.clone(),
            });
        }
        table
    }

    /// The observation as it entered matching: observation and auxiliary
    /// variables of the matched rows.
    pub(crate) fn to_observation(&self) -> SkillResult<Observation> {
        let mut names: Vec<&str> = vec![OBSERVATION_VAR];
        names.extend(self.aux_names());
        let mut series = self.data.select_variables(&names)?;
        series.rename_variable(OBSERVATION_VAR, &self.name().to_string())?;
        Observation::from_series_with_meta(series, self.weight, &self.color, self.attrs.clone())
    }

    // === Renaming ===

    /// Rename models, auxiliary variables or the observation.
    pub fn rename(&self, mapping: &[(&str, &str)]) -> SkillResult<Comparer> {
        let mut out = self.clone();
        for (old, new) in mapping {
            if is_reserved_name(new) {
                return Err(SkillError::invalid_value(format!("cannot rename to reserved name '{new}'")));
            }
            if *old == out.name() {
                out.data.set_name(*new)?;
            } else if out.mod_names().contains(old) {
                out.data.rename_variable(old, new)?;
                for (name, series) in &mut out.raw_mod_data {
                    if name == old {
                        *name = new.to_string();
                        if series.primary().name == *old {
                            series.rename_variable(old, new)?;
                        }
                        series.set_name(*new)?;
                    }
                }
            } else if out.aux_names().contains(old) {
                out.data.rename_variable(old, new)?;
            } else {
                return Err(SkillError::not_found(format!(
                    "'{old}' is not the observation, a model or an auxiliary variable of '{}'",
                    self.name()
                )));
            }
        }
        Ok(out)
    }

    // === Selection ===

    /// Subset by model, time and area.
    pub fn sel(&self, selection: &Selection) -> SkillResult<Comparer> {
        selection.validate()?;
        if let Some(obs) = &selection.observation {
            resolve_unique(obs, &[self.name()])?;
        }

        let mut data = self.data.clone();
        let mut raw = self.raw_mod_data.clone();

        if let Some(models) = &selection.model {
            let names: Vec<String> = self.mod_names().iter().map(|s| s.to_string()).collect();
            let idx = resolve_unique(models, &names)?;
            let keep: Vec<&str> = idx.iter().map(|&i| names[i].as_str()).collect();
            let mut order: Vec<&str> = vec![OBSERVATION_VAR];
            order.extend(keep.iter().copied());
            let aux = self.aux_names();
            order.extend(aux.iter().copied());
            data = data.select_variables(&order)?;
            raw = keep
                .iter()
                .filter_map(|k| self.raw_mod_data.iter().find(|(n, _)| n == k).cloned())
                .collect();
        }

        match selection.time {
            Some(TimeSelection::At(t)) => {
                let at = |s: &TimeSeries| s.filter(&s.time().iter().map(|x| *x == t).collect::<Vec<_>>());
                data = at(&data);
                raw = raw.into_iter().map(|(n, s)| (n, at(&s))).collect();
            }
            Some(TimeSelection::Range(start, end)) => {
                data = data.trim(start, end);
                raw = raw.into_iter().map(|(n, s)| (n, s.trim(start, end))).collect();
            }
            None => {}
        }
        if selection.start.is_some() || selection.end.is_some() {
            let start = selection.start.unwrap_or(NaiveDateTime::MIN);
            let end = selection.end.unwrap_or(NaiveDateTime::MAX);
            data = data.trim(start, end);
            raw = raw.into_iter().map(|(n, s)| (n, s.trim(start, end))).collect();
        }

        if let Some(area) = &selection.area {
            let n = data.n_points();
            let mask = match data.coords() {
                Coordinates::Fixed { x, y, .. } => {
                    let inside = match (x, y) {
                        (Some(x), Some(y)) => area.contains(*x, *y),
                        _ => false,
                    };
                    vec![inside; n]
                }
                Coordinates::Moving { x, y } => area.contains_points(x, y),
            };
            data = data.filter(&mask);
        }

        Ok(Comparer {
            data,
            raw_mod_data: raw,
            ..self.clone()
        })
    }

    /// Keep rows where `mask` is true.
    pub fn where_mask(&self, mask: &[bool]) -> SkillResult<Comparer> {
        if mask.len() != self.n_points() {
            return Err(SkillError::invalid_value(format!(
                "mask has {} values but the comparer has {} points",
                mask.len(),
                self.n_points()
            )));
        }
        Ok(Comparer {
            data: self.data.filter(mask),
            ..self.clone()
        })
    }

    /// Keep rows where `cond` holds.
    pub fn where_fn<F>(&self, cond: F) -> Comparer
    where
        F: Fn(&RowView<'_>) -> bool,
    {
        let (x, y) = (self.x(), self.y());
        let mask: Vec<bool> = (0..self.n_points())
            .map(|row| {
                cond(&RowView {
                    data: &self.data,
                    row,
                    x: x[row],
                    y: y[row],
                })
            })
            .collect();
        Comparer {
            data: self.data.filter(&mask),
            ..self.clone()
        }
    }

    /// Keep rows where the expression is true, e.g. `"Observation > 0"`.
    pub fn query(&self, expr: &str) -> SkillResult<Comparer> {
        let query = Query::parse(expr)?;
        let (x, y) = (self.x(), self.y());
        let mask = query.mask(self.n_points(), |name, row| match name {
            "time" => Some(Value::Time(self.time()[row])),
            "x" => Some(Value::Num(x[row])),
            "y" => Some(Value::Num(y[row])),
            _ => self.data.variable(name).map(|v| Value::Num(v.values[row])),
        })?;
        debug!(comparer = %self.name(), query = expr, kept = mask.iter().filter(|m| **m).count(), "query");
        Ok(Comparer {
            data: self.data.filter(&mask),
            ..self.clone()
        })
    }

    // === Transformations ===

    /// Remove the mean bias of each model, from the models or from the observation.
    ///
    /// Correcting the observation needs a single model.
    pub fn remove_bias(&self, correct: BiasCorrection) -> SkillResult<Comparer> {
        let bias: Vec<(String, f64)> = self
            .mod_names()
            .into_iter()
            .zip(self.residual())
            .map(|(name, r)| {
                let valid: Vec<f64> = r.into_iter().filter(|v| !v.is_nan()).collect();
                let mean = if valid.is_empty() { 0.0 } else { valid.iter().sum::<f64>() / valid.len() as f64 };
                (name.to_string(), mean)
            })
            .collect();

        let (name, time, mut variables, coords, quantity) = self.data.clone().into_parts();
        let mut raw = self.raw_mod_data.clone();
        match correct {
            BiasCorrection::Model => {
                for (model, b) in &bias {
                    shift(&mut variables, model, -b);
                    if let Some((_, series)) = raw.iter_mut().find(|(n, _)| n == model) {
                        let (rn, rt, mut rv, rc, rq) = series.clone().into_parts();
                        rv[0].values.iter_mut().for_each(|v| *v -= b);
                        *series = TimeSeries::new(rn, rt, rv, rc, rq)?;
                    }
                }
            }
            BiasCorrection::Observation => {
                let [(_, b)] = bias.as_slice() else {
                    return Err(SkillError::invalid_value(format!(
                        "bias can only be moved to the observation with a single model, '{}' has {}",
                        self.name(),
                        bias.len()
                    )));
                };
                shift(&mut variables, OBSERVATION_VAR, *b);
            }
        }

        Ok(Comparer {
            data: TimeSeries::new(name, time, variables, coords, quantity)?,
            raw_mod_data: raw,
            ..self.clone()
        })
    }

    /// Combine with another comparer.
    ///
    /// The same observation with the same models merges rows, keeping the
    /// other comparer's rows on shared timestamps. The same observation
    /// with different models is matched again against the union of the raw
    /// model data. Different observations give a collection.
    pub fn concat(&self, other: &Comparer) -> SkillResult<Concatenated> {
        if self.name() != other.name() {
            return ComparerCollection::new(vec![self.clone(), other.clone()]).map(Concatenated::Collection);
        }

        let mut mine = self.mod_names();
        let mut theirs = other.mod_names();
        mine.sort_unstable();
        theirs.sort_unstable();

        if mine == theirs {
            let data = merge_keep_last(&self.data, &other.data)?;
            let raw = self
                .raw_mod_data
                .iter()
                .map(|(name, series)| {
                    let merged = match other.raw_mod_data.iter().find(|(n, _)| n == name) {
                        Some((_, o)) => merge_keep_last(series, o)?,
                        None => series.clone(),
                    };
                    Ok((name.clone(), merged))
                })
                .collect::<SkillResult<Vec<_>>>()?;
            return Ok(Concatenated::Comparer(Comparer {
                data,
                raw_mod_data: raw,
                ..self.clone()
            }));
        }

        let mut raw = self.raw_mod_data.clone();
        for (name, series) in &other.raw_mod_data {
            match raw.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = series.clone(),
                None => raw.push((name.clone(), series.clone())),
            }
        }
        let observation = self.to_observation()?;
        let matched = match_space_time(&observation, &raw, &MatchOptions::default())?;
        Comparer::new(matched, raw, self.weight, &self.color, self.attrs.clone()).map(Concatenated::Comparer)
    }

    // === Skill ===

    /// Skill per group. Defaults: grouped by model, configured metrics.
    pub fn skill(&self, by: Option<&[GroupBy]>, metrics: Option<&[Metric]>) -> SkillResult<SkillTable> {
        if self.n_points() == 0 {
            return Err(SkillError::no_data("No data selected for skill assessment"));
        }
        let by = by
            .map(<[GroupBy]>::to_vec)
            .unwrap_or_else(|| default_group_by(self.n_models(), 1));
        let metrics = resolve_metrics(metrics, self.quantity().is_directional)?;
        compute_skill(&self.to_long_table(), &by, &metrics, self.n_models())
    }

    /// One value per model; RMSE unless another metric is given.
    pub fn score(&self, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>> {
        if self.n_points() == 0 {
            return Err(SkillError::no_data("No data selected for scoring"));
        }
        let metric = match metric {
            Some(m) => m.clone(),
            None => Metric::from_name("rmse")?,
        };
        let obs = self.obs_values();
        Ok(self
            .data
            .variables()
            .iter()
            .filter(|v| v.kind == VarKind::Model)
            .map(|v| (v.name.clone(), metric.compute(obs, &v.values)))
            .collect())
    }

    /// Skill per spatial bin.
    pub fn gridded_skill(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        if self.n_points() == 0 {
            return Err(SkillError::no_data("No data to compare"));
        }
        let by = options
            .by
            .clone()
            .unwrap_or_else(|| default_gridded_by(self.n_models(), 1));
        let metrics = resolve_metrics(options.metrics.as_deref(), self.quantity().is_directional)?;
        let n_min = match options.n_min {
            Some(n) => Some(n),
            None => default_n_min()?,
        };
        compute_gridded(&self.to_long_table(), &by, &metrics, &options.bins, options.binsize, n_min)
    }

    // === Persistence ===

    pub fn save(&self, path: impl AsRef<Path>) -> SkillResult<()> {
        persist::save_comparer(self, path.as_ref())
    }

    pub fn load(path: impl AsRef<Path>) -> SkillResult<Comparer> {
        persist::load_comparer(path.as_ref())
    }
}

fn shift(variables: &mut [Variable], name: &str, by: f64) {
    if let Some(var) = variables.iter_mut().find(|v| v.name == name) {
        var.values.iter_mut().for_each(|v| *v += by);
    }
}

/// Union of two series on time; `b` wins on shared timestamps.
fn merge_keep_last(a: &TimeSeries, b: &TimeSeries) -> SkillResult<TimeSeries> {
    let mut time: Vec<NaiveDateTime> = a.time().iter().chain(b.time()).copied().collect();
    time.sort_unstable();
    time.dedup();
    let source: Vec<(&TimeSeries, usize)> = time
        .iter()
        .filter_map(|t| {
            b.time()
                .binary_search(t)
                .map(|j| (b, j))
                .or_else(|_| a.time().binary_search(t).map(|j| (a, j)))
                .ok()
        })
        .collect();

    let mut variables: Vec<Variable> = Vec::new();
    for var in a.variables().iter().chain(b.variables()) {
        if variables.iter().any(|v| v.name == var.name) {
            continue;
        }
        let values = source
            .iter()
            .map(|(s, j)| s.variable(&var.name).map_or(f64::NAN, |v| v.values[*j]))
            .collect();
        variables.push(Variable::new(var.name.clone(), var.kind, values));
    }

    let coords = if a.coords().is_moving() {
        let pick = |xy: fn(&Coordinates, usize) -> Vec<f64>| -> Vec<f64> {
            let ax = xy(a.coords(), a.n_points());
            let bx = xy(b.coords(), b.n_points());
            source
                .iter()
                .map(|(s, j)| if std::ptr::eq(*s, b) { bx[*j] } else { ax[*j] })
                .collect()
        };
        Coordinates::moving(pick(Coordinates::x_values), pick(Coordinates::y_values))?
    } else {
        a.coords().clone()
    };

    TimeSeries::new(a.name(), time, variables, coords, a.quantity().clone())
}

impl fmt::Display for Comparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Comparer>")?;
        writeln!(f, "Quantity: {}", self.quantity())?;
        writeln!(f, "Observation: {}, n_points={}", self.name(), self.n_points())?;
        writeln!(f, "Model(s):")?;
        let obs = self.obs_values();
        for (i, var) in self.data.variables().iter().filter(|v| v.kind == VarKind::Model).enumerate() {
            let rmse = crate::metrics::rmse(obs, &var.values);
            writeln!(f, "{i}: {} rmse={rmse:.3}", var.name)?;
        }
        let aux = self.aux_names();
        if !aux.is_empty() {
            write!(f, " Auxiliary: {}", aux.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::{areas, matched};
    use test_utils::{assert_approx_eq, daily_times, ts};

    fn comparer(name: &str, start: &str, obs: Vec<f64>, models: &[(&str, Vec<f64>)]) -> Comparer {
        let n = obs.len();
        let mut variables = vec![Variable::new(OBSERVATION_VAR, VarKind::Observation, obs)];
        for (m, values) in models {
            variables.push(Variable::new(*m, VarKind::Model, values.clone()));
        }
        variables.push(Variable::new("wind", VarKind::Auxiliary, vec![1.0; n]));
        let data = TimeSeries::new(
            name,
            daily_times(start, n),
            variables,
            Coordinates::fixed(Some(10.0), Some(55.0), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap();
        Comparer::new(data, Vec::new(), 1.0, "#d62728", Attrs::new()).unwrap()
    }

    fn two_models() -> Comparer {
        comparer(
            "HKNA",
            "2019-01-01",
            vec![1.0, 2.0, 3.0, 4.0],
            &[("m1", vec![1.5, 2.5, 3.5, 4.5]), ("m2", vec![0.0, 2.0, 3.0, 4.0])],
        )
    }

    #[test]
    fn test_new_fills_raw_data() {
        let cmp = two_models();
        let names: Vec<&str> = cmp.raw_mod_data().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["m1", "m2"]);
        assert_eq!(cmp.raw_mod_data()[1].1.values(), &[0.0, 2.0, 3.0, 4.0]);
        assert_eq!(cmp.x(), vec![10.0; 4]);
        assert_eq!(cmp.z(), None);
    }

    #[test]
    fn test_new_rejects_bad_data() {
        let data = TimeSeries::new(
            "a",
            daily_times("2019-01-01", 1),
            vec![Variable::new(OBSERVATION_VAR, VarKind::Observation, vec![1.0])],
            Coordinates::unknown(),
            Quantity::undefined(),
        )
        .unwrap();
        assert!(Comparer::new(data, Vec::new(), 1.0, "red", Attrs::new()).is_err());
    }

    #[test]
    fn test_sel_model_keeps_order() {
        let cmp = two_models().sel(&Selection::new().models(["m2", "m1"])).unwrap();
        assert_eq!(cmp.mod_names(), vec!["m2", "m1"]);
        let one = two_models().sel(&Selection::new().model(-1)).unwrap();
        assert_eq!(one.mod_names(), vec!["m2"]);
        assert_eq!(one.n_models(), 1);
        assert_eq!(one.raw_mod_data().len(), 1);
        assert_eq!(one.aux_names(), vec!["wind"]);
        assert!(two_models().sel(&Selection::new().model("m3")).is_err());
    }

    #[test]
    fn test_sel_time() {
        let cmp = two_models();
        let at = cmp.sel(&Selection::new().time(TimeSelection::At(ts("2019-01-02")))).unwrap();
        assert_eq!(at.n_points(), 1);
        let range = cmp.sel(&Selection::new().start(ts("2019-01-02")).end(ts("2019-01-03"))).unwrap();
        assert_eq!(range.n_points(), 2);
        assert_eq!(range.raw_mod_data()[0].1.n_points(), 2);
        let bad = Selection::new().time(TimeSelection::At(ts("2019-01-02"))).start(ts("2019-01-01"));
        assert!(cmp.sel(&bad).is_err());
    }

    #[test]
    fn test_sel_area_point_all_or_nothing() {
        let cmp = two_models();
        let inside = Area::from_values(&areas::BBOX_FIRST_TWO).unwrap();
        let outside = Area::from_values(&areas::NOWHERE).unwrap();
        assert_eq!(cmp.sel(&Selection::new().area(inside)).unwrap().n_points(), 4);
        assert_eq!(cmp.sel(&Selection::new().area(outside)).unwrap().n_points(), 0);
    }

    #[test]
    fn test_sel_area_track_keeps_rows_inside() {
        let n = 5;
        let data = TimeSeries::new(
            "alti",
            daily_times(matched::START, n),
            vec![
                Variable::new(OBSERVATION_VAR, VarKind::Observation, matched::OBSERVATION[..n].to_vec()),
                Variable::new("m1", VarKind::Model, matched::M1[..n].to_vec()),
            ],
            Coordinates::moving(matched::X[..n].to_vec(), matched::Y[..n].to_vec()).unwrap(),
            Quantity::undefined(),
        )
        .unwrap();
        let cmp = Comparer::new(data, Vec::new(), 1.0, "red", Attrs::new()).unwrap();

        for values in [&areas::BBOX_FIRST_TWO[..], &areas::POLYGON_FIRST_TWO[..]] {
            let area = Area::from_values(values).unwrap();
            let sub = cmp.sel(&Selection::new().area(area)).unwrap();
            assert_eq!(sub.x(), vec![10.1, 10.2]);
        }
    }

    #[test]
    fn test_where_and_query() {
        let cmp = two_models();
        let filtered = cmp.where_fn(|row| row.obs() > 2.0);
        assert_eq!(filtered.n_points(), 2);
        let masked = cmp.where_mask(&[true, false, true, false]).unwrap();
        assert_eq!(masked.obs_values(), &[1.0, 3.0]);
        assert!(cmp.where_mask(&[true]).is_err());
        let queried = cmp.query("m2 < Observation or time == '2019-01-04'").unwrap();
        assert_eq!(queried.time(), &[ts("2019-01-01"), ts("2019-01-04")]);
    }

    #[test]
    fn test_remove_bias() {
        let cmp = two_models().remove_bias(BiasCorrection::Model).unwrap();
        let scores = cmp.score(Some(&Metric::from_name("bias").unwrap())).unwrap();
        assert_approx_eq!(scores["m1"], 0.0, 1e-12);
        assert_approx_eq!(scores["m2"], 0.0, 1e-12);
        assert_approx_eq!(cmp.raw_mod_data()[0].1.values()[0], 1.0, 1e-12);

        assert!(two_models().remove_bias(BiasCorrection::Observation).is_err());
        let single = two_models().sel(&Selection::new().model("m1")).unwrap();
        let corrected = single.remove_bias(BiasCorrection::Observation).unwrap();
        assert_eq!(corrected.obs_values(), &[1.5, 2.5, 3.5, 4.5]);
        assert!("Both".parse::<BiasCorrection>().is_err());
    }

    #[test]
    fn test_rename() {
        let cmp = two_models()
            .rename(&[("m1", "fine"), ("HKNA", "Hoek"), ("wind", "u10")])
            .unwrap();
        assert_eq!(cmp.mod_names(), vec!["fine", "m2"]);
        assert_eq!(cmp.name(), "Hoek");
        assert_eq!(cmp.aux_names(), vec!["u10"]);
        assert_eq!(cmp.raw_mod_data()[0].0, "fine");
        assert!(two_models().rename(&[("m1", "x")]).is_err());
        assert!(matches!(two_models().rename(&[("nope", "a")]), Err(SkillError::NotFound(_))));
    }

    #[test]
    fn test_concat_same_models_keeps_last() {
        let a = comparer("HKNA", "2019-01-01", vec![1.0, 2.0], &[("m1", vec![1.0, 2.0])]);
        let b = comparer("HKNA", "2019-01-02", vec![20.0, 30.0], &[("m1", vec![20.0, 30.0])]);
        let Concatenated::Comparer(c) = a.concat(&b).unwrap() else {
            panic!("expected a comparer");
        };
        assert_eq!(c.obs_values(), &[1.0, 20.0, 30.0]);
        assert_eq!(c.raw_mod_data()[0].1.n_points(), 3);

        let other = comparer("Other", "2019-01-01", vec![1.0], &[("m1", vec![1.0])]);
        assert!(matches!(a.concat(&other).unwrap(), Concatenated::Collection(_)));
    }

    #[test]
    fn test_skill_and_score() {
        let cmp = two_models();
        let st = cmp.skill(None, None).unwrap();
        assert_eq!(st.len(), 2);
        assert_eq!(st.by(), &["model".to_string()]);
        let scores = cmp.score(None).unwrap();
        assert_approx_eq!(scores["m1"], 0.5, 1e-12);
        assert_approx_eq!(scores["m2"], 0.5, 1e-12);

        let empty = cmp.where_fn(|_| false);
        assert!(matches!(empty.skill(None, None), Err(SkillError::NoData(_))));
        assert!(empty.score(None).is_err());
        assert!(cmp.to_string().contains("Observation: HKNA, n_points=4"));
    }
}
