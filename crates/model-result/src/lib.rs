//! Model results and their extraction at observation locations.
//!
//! Point and track results are used as-is. Grid and unstructured results are
//! reduced to a point or track result matching the observation's geometry.

pub mod grid;
pub mod interpolation;
pub mod mesh;
pub mod point;
pub mod track;
pub mod unstructured;

use chrono::NaiveDateTime;
use skill_common::time::Period;
use skill_common::{GeometryType, Quantity, SkillResult};
use timeseries::{Observation, TimeSeries};

pub use grid::GridModelResult;
pub use mesh::{ElementLocator, MeshGeometry};
pub use point::{PointModelResult, PointModelResultBuilder};
pub use track::{TrackModelResult, TrackModelResultBuilder};
pub use unstructured::UnstructuredModelResult;

/// Reduce a model result to the observation's geometry.
pub trait Extract {
    /// Returns a [`ModelResult::Point`] for point observations and a
    /// [`ModelResult::Track`] for track observations.
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult>;
}

/// Any model result.
#[derive(Debug, Clone)]
pub enum ModelResult {
    Point(PointModelResult),
    Track(TrackModelResult),
    Grid(GridModelResult),
    Unstructured(UnstructuredModelResult),
}

impl ModelResult {
    pub fn name(&self) -> &str {
        match self {
            ModelResult::Point(m) => m.name(),
            ModelResult::Track(m) => m.name(),
            ModelResult::Grid(m) => m.name(),
            ModelResult::Unstructured(m) => m.name(),
        }
    }

    pub fn gtype(&self) -> GeometryType {
        match self {
            ModelResult::Point(_) => GeometryType::Point,
            ModelResult::Track(_) => GeometryType::Track,
            ModelResult::Grid(_) => GeometryType::Grid,
            ModelResult::Unstructured(_) => GeometryType::Unstructured,
        }
    }

    pub fn quantity(&self) -> &Quantity {
        match self {
            ModelResult::Point(m) => m.quantity(),
            ModelResult::Track(m) => m.quantity(),
            ModelResult::Grid(m) => m.quantity(),
            ModelResult::Unstructured(m) => m.quantity(),
        }
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        match self {
            ModelResult::Point(m) => m.series().time(),
            ModelResult::Track(m) => m.series().time(),
            ModelResult::Grid(m) => m.time(),
            ModelResult::Unstructured(m) => m.time(),
        }
    }

    /// The extracted series of point and track results; None for spatial fields.
    pub fn series(&self) -> Option<&TimeSeries> {
        match self {
            ModelResult::Point(m) => Some(m.series()),
            ModelResult::Track(m) => Some(m.series()),
            ModelResult::Grid(_) | ModelResult::Unstructured(_) => None,
        }
    }

    pub fn into_series(self) -> Option<TimeSeries> {
        match self {
            ModelResult::Point(m) => Some(m.into_series()),
            ModelResult::Track(m) => Some(m.into_series()),
            ModelResult::Grid(_) | ModelResult::Unstructured(_) => None,
        }
    }
}

impl Extract for ModelResult {
    fn extract(&self, observation: &Observation) -> SkillResult<ModelResult> {
        match self {
            ModelResult::Point(m) => m.extract(observation),
            ModelResult::Track(m) => m.extract(observation),
            ModelResult::Grid(m) => m.extract(observation),
            ModelResult::Unstructured(m) => m.extract(observation),
        }
    }
}

impl From<PointModelResult> for ModelResult {
    fn from(m: PointModelResult) -> Self {
        ModelResult::Point(m)
    }
}

impl From<TrackModelResult> for ModelResult {
    fn from(m: TrackModelResult) -> Self {
        ModelResult::Track(m)
    }
}

impl From<GridModelResult> for ModelResult {
    fn from(m: GridModelResult) -> Self {
        ModelResult::Grid(m)
    }
}

impl From<UnstructuredModelResult> for ModelResult {
    fn from(m: UnstructuredModelResult) -> Self {
        ModelResult::Unstructured(m)
    }
}

/// Warn when the observation period does not overlap the model period.
///
/// Returns whether the periods overlap.
pub fn validate_overlap_in_time(model_name: &str, model_time: &[NaiveDateTime], observation: &Observation) -> bool {
    let overlaps = match (Period::of_sorted(model_time), Period::of_sorted(observation.time())) {
        (Some(model), Some(obs)) => model.overlaps(&obs),
        _ => false,
    };
    if !overlaps {
        tracing::warn!(
            model = %model_name,
            observation = %observation.name(),
            "No time overlap between model result '{}' and observation '{}'",
            model_name,
            observation.name()
        );
    }
    overlaps
}
