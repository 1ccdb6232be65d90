//! Model results on a flexible mesh.

use std::sync::Arc;

use chrono::NaiveDateTime;
use skill_common::time::round_to_resolution;
use skill_common::{Quantity, SkillError, SkillResult};
use timeseries::{
    Coordinates, Observation, PointObservation, TimeSeries, TrackObservation, VarKind, Variable,
};

use crate::interpolation::{temporal_blend, time_fraction};
use crate::mesh::ElementLocator;
use crate::point::PointModelResult;
use crate::track::TrackModelResult;
use crate::{validate_overlap_in_time, Extract, ModelResult};

/// Element-centred model output laid out `[time][element]`.
#[derive(Debug, Clone)]
pub struct UnstructuredModelResult {
    name: String,
    time: Vec<NaiveDateTime>,
    geometry: Arc<dyn ElementLocator>,
    values: Vec<f64>,
    quantity: Quantity,
}

impl UnstructuredModelResult {
    pub fn new(
        name: impl Into<String>,
        time: Vec<NaiveDateTime>,
        geometry: impl ElementLocator + 'static,
        values: Vec<f64>,
    ) -> SkillResult<Self> {
        Self::with_locator(name, time, Arc::new(geometry), values)
    }

    /// Same as [`UnstructuredModelResult::new`] with a shared locator.
    pub fn with_locator(
        name: impl Into<String>,
        time: Vec<NaiveDateTime>,
        geometry: Arc<dyn ElementLocator>,
        values: Vec<f64>,
    ) -> SkillResult<Self> {
        let name = name.into();
        let n_elements = geometry.n_elements();
        if values.len() != time.len() * n_elements {
            return Err(SkillError::invalid_value(format!(
                "mesh result '{name}' has {} values, expected {} x {n_elements}",
                values.len(),
                time.len()
            )));
        }
        let time: Vec<NaiveDateTime> = time.into_iter().map(round_to_resolution).collect();
        if time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SkillError::invalid_value(format!("time of '{name}' must be strictly increasing")));
        }
        Ok(Self {
            name,
            time,
            geometry,
            values,
            quantity: Quantity::undefined(),
        })
    }

    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    pub fn geometry(&self) -> &dyn ElementLocator {
        self.geometry.as_ref()
    }

    fn value(&self, t: usize, element: usize) -> f64 {
        self.values[t * self.geometry.n_elements() + element]
    }

    fn weighted(&self, t: usize, weights: &[(usize, f64)]) -> f64 {
        weights.iter().map(|(e, w)| w * self.value(t, *e)).sum()
    }

    /// Time series of the element containing the observation. Missing values are dropped.
    pub fn extract_point(&self, obs: &PointObservation) -> SkillResult<PointModelResult> {
        let (Some(x), Some(y)) = (obs.x(), obs.y()) else {
            return Err(SkillError::invalid_value(format!(
                "observation '{}' has no position, cannot extract from mesh '{}'",
                obs.name(),
                self.name
            )));
        };
        let element = self.geometry.find_element(x, y).ok_or_else(|| {
            SkillError::outside_domain(
                format!("observation '{}'", obs.name()),
                x,
                y,
                format!("model domain of '{}'", self.name),
            )
        })?;
        let (cx, cy) = self.geometry.element_center(element);
        let values: Vec<f64> = (0..self.time.len()).map(|t| self.value(t, element)).collect();
        let series = TimeSeries::new(
            self.name.clone(),
            self.time.clone(),
            vec![Variable::new(self.name.clone(), VarKind::Model, values)],
            Coordinates::fixed(Some(cx), Some(cy), obs.z()),
            self.quantity.clone(),
        )?;
        PointModelResult::from_series(series.dropna())
    }

    /// Values interpolated in space with the locator weights and linearly in time.
    ///
    /// Rows outside the mesh or the model period are dropped.
    pub fn extract_track(&self, obs: &TrackObservation) -> SkillResult<TrackModelResult> {
        let nt = self.time.len();
        let (xs, ys) = (obs.x(), obs.y());
        let values: Vec<f64> = obs
            .time()
            .iter()
            .zip(xs.iter().zip(&ys))
            .map(|(t, (x, y))| {
                let (Some(ft), Some(weights)) =
                    (time_fraction(&self.time, *t), self.geometry.interpolation_weights(*x, *y))
                else {
                    return f64::NAN;
                };
                temporal_blend(ft, nt, |ti| self.weighted(ti, &weights))
            })
            .collect();

        let series = TimeSeries::new(
            self.name.clone(),
            obs.time().to_vec(),
            vec![Variable::new(self.name.clone(), VarKind::Model, values)],
            Coordinates::moving(xs, ys)?,
            self.quantity.clone(),
        )?;
        TrackModelResult::from_series(series.dropna())
    }
}

impl Extract for UnstructuredModelResult {
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult> {
        validate_overlap_in_time(&self.name, &self.time, observation);
        match observation {
            Observation::Point(obs) => self.extract_point(obs).map(ModelResult::Point),
            Observation::Track(obs) => self.extract_track(obs).map(ModelResult::Track),
        }
    }
}
