//! Matching observations with model results in space and time.
//!
//! [`match_space_time`] is the core: it aligns one observation with the
//! extracted series of one or more models and returns the matched dataset a
//! [`Comparer`] is built on. [`match_observation`] and [`match_many`] run
//! extraction first; [`from_matched`] wraps data that is already aligned.

use chrono::{Duration, NaiveDateTime};
use skill_common::item::resolve_unique;
use skill_common::time::duration_from_secs_f64;
use skill_common::{is_reserved_name, Attrs, ItemRef, Quantity, SkillError, SkillResult, OBSERVATION_VAR};
use timeseries::synonyms::canonical_name;
use timeseries::{
    interp_time, within_model_gap, Column, Coordinates, DataTable, Observation, TimeSeries, VarKind, Variable,
    DEFAULT_OBS_COLOR,
};
use tracing::{debug, warn};

use model_result::{Extract, ModelResult};

use crate::collection::ComparerCollection;
use crate::comparer::Comparer;

/// Default spatial tolerance between observation and model track positions.
pub const DEFAULT_SPATIAL_TOLERANCE: f64 = 1e-3;

/// Options for the matching engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOptions {
    /// Drop matches whose bracketing model timestamps are further apart.
    pub max_model_gap: Option<Duration>,
    /// Track positions must agree within this distance on both axes.
    pub spatial_tolerance: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_model_gap: None,
            spatial_tolerance: DEFAULT_SPATIAL_TOLERANCE,
        }
    }
}

impl MatchOptions {
    pub fn with_max_model_gap(mut self, gap: Duration) -> Self {
        self.max_model_gap = Some(gap);
        self
    }

    pub fn with_max_model_gap_secs(self, secs: f64) -> SkillResult<Self> {
        if secs < 0.0 {
            return Err(SkillError::invalid_value(format!("max_model_gap must not be negative, got {secs}")));
        }
        Ok(self.with_max_model_gap(duration_from_secs_f64(secs)?))
    }

    pub fn with_spatial_tolerance(mut self, tol: f64) -> Self {
        self.spatial_tolerance = tol;
        self
    }
}

// ============================================================================
// Core engine
// ============================================================================

/// Values of `raw` at `time` by exact timestamp; optionally only where the
/// positions agree with `obs_xy` within `tol`.
fn align_exact(
    raw: &TimeSeries,
    time: &[NaiveDateTime],
    obs_xy: Option<(&[f64], &[f64])>,
    tol: f64,
) -> Vec<Variable> {
    let raw_x = raw.coords().x_values(raw.n_points());
    let raw_y = raw.coords().y_values(raw.n_points());
    let rows: Vec<Option<usize>> = time
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let j = raw.time().binary_search(t).ok()?;
            match obs_xy {
                Some((ox, oy)) if !((raw_x[j] - ox[i]).abs() < tol && (raw_y[j] - oy[i]).abs() < tol) => None,
                _ => Some(j),
            }
        })
        .collect();
    raw.variables()
        .iter()
        .map(|v| {
            let values = rows.iter().map(|r| r.map_or(f64::NAN, |j| v.values[j])).collect();
            Variable::new(v.name.clone(), v.kind, values)
        })
        .collect()
}

/// Align one observation with the raw series of each model.
///
/// The observation is trimmed to the union of the model time spans. Point
/// models are interpolated to the observation times; track models are
/// joined on exact timestamps and, for track observations, must agree in
/// position within the spatial tolerance. Rows with a missing observation
/// or model value are dropped; auxiliary variables may keep gaps.
pub fn match_space_time(
    observation: &Observation,
    raw_mod_data: &[(String, TimeSeries)],
    options: &MatchOptions,
) -> SkillResult<TimeSeries> {
    let period = raw_mod_data
        .iter()
        .filter_map(|(_, s)| s.period())
        .reduce(|a, b| a.union(&b));
    let obs = match period {
        Some(p) => observation.series().trim(p.start, p.end),
        None => observation.series().take(&[]),
    };
    let time = obs.time().to_vec();
    let n = time.len();
    let obs_track = obs.coords().is_moving();
    let obs_x = obs.coords().x_values(n);
    let obs_y = obs.coords().y_values(n);

    let mut variables: Vec<Variable> = Vec::new();
    let mut aux: Vec<Variable> = Vec::new();
    for (i, v) in obs.variables().iter().enumerate() {
        if i == 0 {
            variables.push(Variable::new(OBSERVATION_VAR, VarKind::Observation, v.values.clone()));
        } else {
            aux.push(Variable::new(v.name.clone(), VarKind::Auxiliary, v.values.clone()));
        }
    }

    for (name, raw) in raw_mod_data {
        if obs_track && !raw.coords().is_moving() {
            return Err(SkillError::invalid_type(format!(
                "model '{name}' is a point series and cannot be matched with track observation '{}'",
                observation.name()
            )));
        }
        if !observation.quantity().is_compatible(raw.quantity()) {
            warn!(
                observation = %observation.name(),
                model = %name,
                observation_quantity = %observation.quantity(),
                model_quantity = %raw.quantity(),
                "Quantity of model and observation differ"
            );
        }

        let mut aligned = if raw.coords().is_moving() {
            let xy = obs_track.then_some((obs_x.as_slice(), obs_y.as_slice()));
            align_exact(raw, &time, xy, options.spatial_tolerance)
        } else {
            interp_time(raw, &time)?.into_parts().2
        };

        if let Some(gap) = options.max_model_gap {
            let valid = within_model_gap(&time, raw.time(), gap);
            for var in &mut aligned {
                for (v, ok) in var.values.iter_mut().zip(&valid) {
                    if !ok {
                        *v = f64::NAN;
                    }
                }
            }
        }

        for (k, mut var) in aligned.into_iter().enumerate() {
            if k == 0 {
                var.name = name.clone();
                var.kind = VarKind::Model;
            } else {
                var.kind = VarKind::Auxiliary;
            }
            if variables.iter().chain(&aux).any(|v| v.name == var.name) {
                return Err(SkillError::name_collision(format!(
                    "model '{name}' and observation have overlapping variables: '{}'",
                    var.name
                )));
            }
            if k == 0 {
                variables.push(var);
            } else {
                aux.push(var);
            }
        }
    }

    let keep: Vec<usize> = (0..n)
        .filter(|&i| variables.iter().all(|v| !v.values[i].is_nan()))
        .collect();
    debug!(
        observation = %observation.name(),
        models = raw_mod_data.len(),
        candidates = n,
        matched = keep.len(),
        "matched observation"
    );

    variables.extend(aux);
    let matched = TimeSeries::new(
        observation.name(),
        time,
        variables,
        obs.coords().clone(),
        obs.quantity().clone(),
    )?;
    Ok(matched.take(&keep))
}

// ============================================================================
// Extraction + matching
// ============================================================================

/// Extract every model at the observation and match them.
pub fn match_observation(
    observation: &Observation,
    models: &[ModelResult],
    options: &MatchOptions,
) -> SkillResult<Comparer> {
    if models.is_empty() {
        return Err(SkillError::invalid_value("at least one model result is required"));
    }
    let mut raw_mod_data: Vec<(String, TimeSeries)> = Vec::with_capacity(models.len());
    for model in models {
        if raw_mod_data.iter().any(|(n, _)| n == model.name()) {
            return Err(SkillError::name_collision(format!(
                "model name '{}' is used more than once",
                model.name()
            )));
        }
        let extracted = model.extract(observation)?;
        let name = extracted.name().to_string();
        let series = extracted.into_series().ok_or_else(|| {
            SkillError::invalid_type(format!("extraction of '{name}' did not produce a point or track series"))
        })?;
        raw_mod_data.push((name, series));
    }
    let matched = match_space_time(observation, &raw_mod_data, options)?;
    Comparer::new(
        matched,
        raw_mod_data,
        observation.weight(),
        observation.color(),
        observation.attrs().clone(),
    )
}

/// Match several observations with the same models.
///
/// Observations without any overlapping data are skipped with a warning.
pub fn match_many(
    observations: &[Observation],
    models: &[ModelResult],
    options: &MatchOptions,
) -> SkillResult<ComparerCollection> {
    let mut comparers = Vec::with_capacity(observations.len());
    for obs in observations {
        let cmp = match_observation(obs, models, options)?;
        if cmp.n_points() == 0 {
            warn!(observation = %obs.name(), "No overlapping data was found");
            continue;
        }
        comparers.push(cmp);
    }
    ComparerCollection::new(comparers)
}

// ============================================================================
// Already matched data
// ============================================================================

/// Start building a [`Comparer`] from an already aligned table.
///
/// ```ignore
/// let cmp = from_matched(table)
///     .obs_item("obs")
///     .mod_items(["m1", "m2"])
///     .x(12.7)
///     .y(55.6)
///     .build()?;
/// ```
pub fn from_matched(table: DataTable) -> FromMatchedBuilder {
    FromMatchedBuilder {
        table,
        obs_item: None,
        mod_items: None,
        aux_items: Vec::new(),
        name: None,
        weight: 1.0,
        x: None,
        y: None,
        z: None,
        quantity: None,
    }
}

pub struct FromMatchedBuilder {
    table: DataTable,
    obs_item: Option<ItemRef>,
    mod_items: Option<Vec<ItemRef>>,
    aux_items: Vec<ItemRef>,
    name: Option<String>,
    weight: f64,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    quantity: Option<Quantity>,
}

impl FromMatchedBuilder {
    pub fn obs_item(mut self, item: impl Into<ItemRef>) -> Self {
        self.obs_item = Some(item.into());
        self
    }

    pub fn mod_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemRef>,
    {
        self.mod_items = Some(items.into_iter().map(Into::into).collect());
        self
    }

    pub fn aux_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemRef>,
    {
        self.aux_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn x(mut self, x: f64) -> Self {
        self.x = Some(x);
        self
    }

    pub fn y(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }

    pub fn z(mut self, z: f64) -> Self {
        self.z = Some(z);
        self
    }

    pub fn quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn build(self) -> SkillResult<Comparer> {
        let (time, columns) = self.table.into_time_indexed()?;

        let coord_pos = |axis: &str| columns.iter().position(|c| canonical_name(&c.name) == Some(axis));
        let (x_pos, y_pos, z_pos) = (coord_pos("x"), coord_pos("y"), coord_pos("z"));
        let item_pos: Vec<usize> = (0..columns.len())
            .filter(|i| Some(*i) != x_pos && Some(*i) != y_pos && Some(*i) != z_pos)
            .collect();
        let names: Vec<&str> = item_pos.iter().map(|&i| columns[i].name.as_str()).collect();

        let obs_idx = self.obs_item.unwrap_or(ItemRef::Index(0)).resolve(&names)?;
        let aux_idx = resolve_unique(&self.aux_items, &names)?;
        let mod_idx = match &self.mod_items {
            Some(items) => resolve_unique(items, &names)?,
            None => (0..names.len())
                .filter(|i| *i != obs_idx && !aux_idx.contains(i))
                .collect(),
        };
        if mod_idx.is_empty() {
            return Err(SkillError::invalid_value("matched data needs at least one model item"));
        }
        if mod_idx.contains(&obs_idx) || aux_idx.contains(&obs_idx) || mod_idx.iter().any(|m| aux_idx.contains(m)) {
            return Err(SkillError::invalid_value(
                "observation, model and auxiliary items must be distinct",
            ));
        }

        let float_values = |idx: usize| -> SkillResult<Vec<f64>> {
            let col: &Column = &columns[item_pos[idx]];
            col.data
                .as_float()
                .map(<[f64]>::to_vec)
                .ok_or_else(|| SkillError::invalid_type(format!("item '{}' must be numeric", col.name)))
        };

        let obs_name = names[obs_idx].to_string();
        let mut variables = vec![Variable::new(OBSERVATION_VAR, VarKind::Observation, float_values(obs_idx)?)];
        for &m in &mod_idx {
            if is_reserved_name(names[m]) {
                return Err(SkillError::invalid_value(format!("'{}' is a reserved name", names[m])));
            }
            variables.push(Variable::new(names[m], VarKind::Model, float_values(m)?));
        }
        for &a in &aux_idx {
            variables.push(Variable::new(names[a], VarKind::Auxiliary, float_values(a)?));
        }

        let coord_values = |pos: Option<usize>, axis: &str| -> SkillResult<Option<Vec<f64>>> {
            pos.map(|p| {
                columns[p]
                    .data
                    .as_float()
                    .map(<[f64]>::to_vec)
                    .ok_or_else(|| SkillError::invalid_type(format!("{axis} coordinate must be numeric")))
            })
            .transpose()
        };
        let coords = match (coord_values(x_pos, "x")?, coord_values(y_pos, "y")?) {
            (Some(x), Some(y)) => Coordinates::moving(x, y)?,
            _ => Coordinates::fixed(self.x, self.y, self.z),
        };

        let quantity = self
            .quantity
            .or_else(|| columns[item_pos[obs_idx]].quantity.clone())
            .unwrap_or_default();
        let name = self.name.unwrap_or(obs_name);
        let data = TimeSeries::new(name, time, variables, coords, quantity)?.dropna();

        Comparer::new(data, Vec::new(), self.weight, DEFAULT_OBS_COLOR, Attrs::new())
    }
}
