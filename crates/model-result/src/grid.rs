//! Model results on a regular rectilinear grid.

use chrono::NaiveDateTime;
use skill_common::time::round_to_resolution;
use skill_common::{BoundingBox, Quantity, SkillError, SkillResult};
use timeseries::{
    Coordinates, Observation, PointObservation, TimeSeries, TrackObservation, VarKind, Variable,
};

use crate::interpolation::{axis_fraction, bilinear_interpolate, nearest_index, temporal_blend, time_fraction};
use crate::point::PointModelResult;
use crate::track::TrackModelResult;
use crate::{validate_overlap_in_time, Extract, ModelResult};

/// Gridded model output with values laid out `[time][y][x]`.
///
/// Axes are stored ascending; descending input axes are flipped at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct GridModelResult {
    name: String,
    time: Vec<NaiveDateTime>,
    x: Vec<f64>,
    y: Vec<f64>,
    values: Vec<f64>,
    quantity: Quantity,
}

/// Direction of a strictly monotonic axis.
fn axis_direction(name: &str, axis: &[f64]) -> SkillResult<bool> {
    if axis.is_empty() {
        return Err(SkillError::invalid_value(format!("grid axis '{name}' is empty")));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(SkillError::invalid_value(format!("grid axis '{name}' has non-finite values")));
    }
    let ascending = axis.windows(2).all(|w| w[1] > w[0]);
    let descending = axis.windows(2).all(|w| w[1] < w[0]);
    match (ascending, descending) {
        (true, _) => Ok(true),
        (false, true) => Ok(false),
        _ => Err(SkillError::invalid_value(format!("grid axis '{name}' must be strictly monotonic"))),
    }
}

impl GridModelResult {
    pub fn new(
        name: impl Into<String>,
        time: Vec<NaiveDateTime>,
        x: Vec<f64>,
        y: Vec<f64>,
        values: Vec<f64>,
    ) -> SkillResult<Self> {
        let name = name.into();
        let (nt, ny, nx) = (time.len(), y.len(), x.len());
        if values.len() != nt * ny * nx {
            return Err(SkillError::invalid_value(format!(
                "grid '{name}' has {} values, expected {nt} x {ny} x {nx}",
                values.len()
            )));
        }
        let time: Vec<NaiveDateTime> = time.into_iter().map(round_to_resolution).collect();
        if time.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SkillError::invalid_value(format!("time of grid '{name}' must be strictly increasing")));
        }

        let x_ascending = axis_direction("x", &x)?;
        let y_ascending = axis_direction("y", &y)?;

        let mut grid = Self {
            name,
            time,
            x,
            y,
            values,
            quantity: Quantity::undefined(),
        };
        if !x_ascending {
            grid.flip_x();
        }
        if !y_ascending {
            grid.flip_y();
        }
        Ok(grid)
    }

    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    fn flip_x(&mut self) {
        let nx = self.x.len();
        self.x.reverse();
        for row in self.values.chunks_mut(nx) {
            row.reverse();
        }
    }

    fn flip_y(&mut self) {
        let (ny, nx) = (self.y.len(), self.x.len());
        self.y.reverse();
        for slice in self.values.chunks_mut(ny * nx) {
            for j in 0..ny / 2 {
                for i in 0..nx {
                    slice.swap(j * nx + i, (ny - 1 - j) * nx + i);
                }
            }
        }
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

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    /// Extent of the grid nodes.
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x[0], self.y[0], self.x[self.x.len() - 1], self.y[self.y.len() - 1])
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.bbox().contains_point(x, y)
    }

    fn slice(&self, t: usize) -> &[f64] {
        let n = self.x.len() * self.y.len();
        &self.values[t * n..(t + 1) * n]
    }

    /// Value at grid indices.
    pub fn value(&self, t: usize, iy: usize, ix: usize) -> f64 {
        self.slice(t)[iy * self.x.len() + ix]
    }

    /// Time series at the grid node nearest to the observation. Missing values are dropped.
    pub fn extract_point(&self, obs: &PointObservation) -> SkillResult<PointModelResult> {
        let (Some(x), Some(y)) = (obs.x(), obs.y()) else {
            return Err(SkillError::invalid_value(format!(
                "observation '{}' has no position, cannot extract from grid '{}'",
                obs.name(),
                self.name
            )));
        };
        if !self.contains(x, y) {
            return Err(SkillError::outside_domain(
                format!("observation '{}'", obs.name()),
                x,
                y,
                format!("model domain of '{}'", self.name),
            ));
        }
        let (Some(ix), Some(iy)) = (nearest_index(&self.x, x), nearest_index(&self.y, y)) else {
            return Err(SkillError::outside_domain(format!("observation '{}'", obs.name()), x, y, "model domain"));
        };

        let values: Vec<f64> = (0..self.time.len()).map(|t| self.value(t, iy, ix)).collect();
        let series = TimeSeries::new(
            self.name.clone(),
            self.time.clone(),
            vec![Variable::new(self.name.clone(), VarKind::Model, values)],
            Coordinates::fixed(Some(self.x[ix]), Some(self.y[iy]), None),
            self.quantity.clone(),
        )?;
        PointModelResult::from_series(series.dropna())
    }

    /// Values interpolated linearly in time and space at each observed track position.
    ///
    /// Rows outside the grid in time or space, or touching a missing grid value, are dropped.
    pub fn extract_track(&self, obs: &TrackObservation) -> SkillResult<TrackModelResult> {
        let (nx, ny, nt) = (self.x.len(), self.y.len(), self.time.len());
        let (xs, ys) = (obs.x(), obs.y());

        let values: Vec<f64> = obs
            .time()
            .iter()
            .zip(xs.iter().zip(&ys))
            .map(|(t, (x, y))| {
                let (Some(ft), Some(fx), Some(fy)) = (
                    time_fraction(&self.time, *t),
                    axis_fraction(&self.x, *x),
                    axis_fraction(&self.y, *y),
                ) else {
                    return f64::NAN;
                };
                temporal_blend(ft, nt, |ti| bilinear_interpolate(self.slice(ti), nx, ny, fx, fy))
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

impl Extract for GridModelResult {
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult> {
        validate_overlap_in_time(&self.name, &self.time, observation);
        match observation {
            Observation::Point(obs) => self.extract_point(obs).map(ModelResult::Point),
            Observation::Track(obs) => self.extract_track(obs).map(ModelResult::Track),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, create_test_grid, hourly_times};

    #[test]
    fn test_value_count_checked() {
        let err = GridModelResult::new("g", hourly_times("2019-01-01", 2), vec![0.0, 1.0], vec![0.0], vec![0.0; 3]);
        assert!(err.is_err());
    }

    #[test]
    fn test_descending_axes_normalised() {
        // nt=1, ny=2, nx=3; y descending, x descending
        let values = create_test_grid(1, 2, 3);
        let grid = GridModelResult::new(
            "g",
            hourly_times("2019-01-01", 1),
            vec![2.0, 1.0, 0.0],
            vec![1.0, 0.0],
            values,
        )
        .unwrap();
        assert_eq!(grid.x(), &[0.0, 1.0, 2.0]);
        assert_eq!(grid.y(), &[0.0, 1.0]);
        // the node at (x=0, y=0) was the last input cell: y index 1, x index 2
        assert_approx_eq!(grid.value(0, 0, 0), 12.0, 1e-12);
        assert_approx_eq!(grid.value(0, 1, 2), 0.0, 1e-12);
    }

    #[test]
    fn test_non_monotonic_axis_rejected() {
        let err = GridModelResult::new("g", hourly_times("2019-01-01", 1), vec![0.0, 2.0, 1.0], vec![0.0], vec![0.0; 3]);
        assert!(err.is_err());
    }

    #[test]
    fn test_bbox() {
        let grid = GridModelResult::new(
            "g",
            hourly_times("2019-01-01", 1),
            vec![10.0, 11.0],
            vec![55.0, 56.0],
            vec![0.0; 4],
        )
        .unwrap();
        assert_eq!(grid.bbox(), BoundingBox::new(10.0, 55.0, 11.0, 56.0));
        assert!(grid.contains(10.5, 55.5));
        assert!(!grid.contains(9.0, 55.5));
    }
}
