//! Model results already extracted along a track.

use skill_common::{ItemRef, Quantity, SkillError, SkillResult};
use timeseries::{DataTable, DuplicatePolicy, Observation, TimeSeries, TrackInput, VarKind};

use crate::{validate_overlap_in_time, Extract, ModelResult};

/// A model time series along a moving path.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackModelResult {
    series: TimeSeries,
}

impl TrackModelResult {
    pub fn from_table(table: DataTable) -> TrackModelResultBuilder {
        TrackModelResultBuilder {
            table,
            input: TrackInput::default(),
        }
    }

    /// Wrap a track series. Its primary variable is tagged as model data.
    pub fn from_series(mut series: TimeSeries) -> SkillResult<Self> {
        if !series.coords().is_moving() {
            return Err(SkillError::invalid_type(format!(
                "'{}' has a fixed position, use a point model result",
                series.name()
            )));
        }
        series.set_primary_kind(VarKind::Model);
        Ok(Self { series })
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
}

impl Extract for TrackModelResult {
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult> {
        match observation {
            Observation::Track(_) => {
                validate_overlap_in_time(self.name(), self.series.time(), observation);
                Ok(ModelResult::Track(self.clone()))
            }
            Observation::Point(obs) => Err(SkillError::invalid_type(format!(
                "track model result '{}' cannot be matched with point observation '{}'",
                self.name(),
                obs.name()
            ))),
        }
    }
}

/// Builder for [`TrackModelResult`]. Repeated timestamps keep the first row.
#[derive(Debug, Clone)]
pub struct TrackModelResultBuilder {
    table: DataTable,
    input: TrackInput,
}

impl TrackModelResultBuilder {
    pub fn item(mut self, item: impl Into<ItemRef>) -> Self {
        self.input.item = Some(item.into());
        self
    }

    pub fn x_item(mut self, item: impl Into<ItemRef>) -> Self {
        self.input.x_item = Some(item.into());
        self
    }

    pub fn y_item(mut self, item: impl Into<ItemRef>) -> Self {
        self.input.y_item = Some(item.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.input.name = Some(name.into());
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

    pub fn build(self) -> SkillResult<TrackModelResult> {
        let series = self.input.parse(self.table, VarKind::Model)?;
        Ok(TrackModelResult { series })
    }
}
