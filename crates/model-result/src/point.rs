//! Model results already extracted at a fixed position.

use skill_common::{ItemRef, Quantity, SkillError, SkillResult};
use timeseries::{Coordinates, DataTable, DuplicatePolicy, Observation, PointInput, TimeSeries, VarKind};

use crate::{validate_overlap_in_time, Extract, ModelResult};

/// A model time series at one location.
#[derive(Debug, Clone, PartialEq)]
pub struct PointModelResult {
    series: TimeSeries,
    position_tolerance: Option<f64>,
}

impl PointModelResult {
    pub fn from_table(table: DataTable) -> PointModelResultBuilder {
        PointModelResultBuilder {
            table,
            input: PointInput::default(),
        }
    }

    /// Wrap a point series. Its primary variable is tagged as model data.
    pub fn from_series(mut series: TimeSeries) -> SkillResult<Self> {
        if series.coords().is_moving() {
            return Err(SkillError::invalid_type(format!(
                "'{}' has moving coordinates, use a track model result",
                series.name()
            )));
        }
        series.set_primary_kind(VarKind::Model);
        Ok(Self {
            series,
            position_tolerance: None,
        })
    }

    /// Reject observations farther than `tol` from this result's position.
    pub fn with_position_tolerance(mut self, tol: f64) -> Self {
        self.position_tolerance = Some(tol);
        self
    }

    pub fn name(&self) -> &str {
        self.series.name()
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn into_series(self) -> TimeSeries {
        self.series
    }

    pub fn quantity(&self) -> &Quantity {
        self.series.quantity()
    }

    fn position(&self) -> (Option<f64>, Option<f64>) {
        match self.series.coords() {
            Coordinates::Fixed { x, y, .. } => (*x, *y),
            Coordinates::Moving { .. } => (None, None),
        }
    }

    fn check_position(&self, obs_x: Option<f64>, obs_y: Option<f64>) -> SkillResult<()> {
        let Some(tol) = self.position_tolerance else {
            return Ok(());
        };
        if let ((Some(mx), Some(my)), Some(ox), Some(oy)) = (self.position(), obs_x, obs_y) {
            let dist = (mx - ox).hypot(my - oy);
            if dist > tol {
                return Err(SkillError::invalid_value(format!(
                    "model result '{}' at ({mx}, {my}) is {dist:.4} from the observation at ({ox}, {oy}), tolerance is {tol}",
                    self.name()
                )));
            }
        }
        Ok(())
    }
}

impl Extract for PointModelResult {
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult> {
        match observation {
            Observation::Point(obs) => {
                self.check_position(obs.x(), obs.y())?;
                validate_overlap_in_time(self.name(), self.series.time(), observation);
                Ok(ModelResult::Point(self.clone()))
            }
            Observation::Track(obs) => Err(SkillError::invalid_type(format!(
                "point model result '{}' cannot be matched with track observation '{}'",
                self.name(),
                obs.name()
            ))),
        }
    }
}

/// Builder for [`PointModelResult`].
#[derive(Debug, Clone)]
pub struct PointModelResultBuilder {
    table: DataTable,
    input: PointInput,
}

impl PointModelResultBuilder {
    pub fn item(mut self, item: impl Into<ItemRef>) -> Self {
        self.input.item = Some(item.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.input.name = Some(name.into());
        self
    }

    pub fn x(mut self, x: f64) -> Self {
        self.input.x = Some(x);
        self
    }

    pub fn y(mut self, y: f64) -> Self {
        self.input.y = Some(y);
        self
    }

    pub fn z(mut self, z: f64) -> Self {
        self.input.z = Some(z);
        self
    }

    pub fn position(mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        self.input.x = x;
        self.input.y = y;
        self.input.z = z;
        self
    }

    pub fn quantity(mut self, quantity: Quantity) -> Self {
        self.input.quantity = Some(quantity);
        self
    }

    pub fn aux_items<I, T>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ItemRef>,
    {
        self.input.aux_items = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn keep_duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.input.keep_duplicates = policy;
        self
    }

    pub fn build(self) -> SkillResult<PointModelResult> {
        let series = self.input.parse(self.table, VarKind::Model)?;
        Ok(PointModelResult {
            series,
            position_tolerance: None,
        })
    }
}
