//! Point and track observations.
//!
//! Observations are built from a [`DataTable`] with a builder:
//!
//! ```ignore
//! let obs = PointObservation::builder(table)
//!     .item("WL")
//!     .x(12.8965)
//!     .y(55.5215)
//!     .name("Klagshamn")
//!     .build()?;
//! ```

use chrono::NaiveDateTime;
use skill_common::attrs::validate_user_attrs;
use skill_common::{AttrValue, Attrs, GeometryType, ItemRef, Quantity, SkillError, SkillResult};

use crate::coords::Coordinates;
use crate::duplicates::DuplicatePolicy;
use crate::parse::{PointInput, TrackInput};
use crate::series::TimeSeries;
use crate::table::DataTable;
use crate::variable::VarKind;
use crate::DEFAULT_OBS_COLOR;

/// Presentation and weighting metadata shared by all observations.
#[derive(Debug, Clone, PartialEq)]
struct ObsMeta {
    weight: f64,
    color: String,
    attrs: Attrs,
}

impl ObsMeta {
    fn new(weight: f64, color: Option<String>, attrs: Attrs) -> SkillResult<Self> {
        validate_weight(weight)?;
        validate_user_attrs(&attrs)?;
        Ok(Self {
            weight,
            color: color.unwrap_or_else(|| DEFAULT_OBS_COLOR.to_string()),
            attrs,
        })
    }
}

fn validate_weight(weight: f64) -> SkillResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(SkillError::invalid_value(format!(
            "weight must be a finite non-negative number, got {weight}"
        )));
    }
    Ok(())
}

/// Observed series at a fixed location.
#[derive(Debug, Clone, PartialEq)]
pub struct PointObservation {
    series: TimeSeries,
    meta: ObsMeta,
}

/// Observed series along a moving path.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackObservation {
    series: TimeSeries,
    meta: ObsMeta,
}

impl PointObservation {
    pub fn builder(table: DataTable) -> PointObservationBuilder {
        PointObservationBuilder {
            table,
            input: PointInput::default(),
            weight: 1.0,
            color: None,
            attrs: Attrs::new(),
        }
    }

    /// Wrap an existing point series. Its primary variable becomes the observed values.
    pub fn from_series(mut series: TimeSeries) -> SkillResult<Self> {
        if series.coords().is_moving() {
            return Err(SkillError::invalid_type(format!(
                "'{}' has moving coordinates, use a track observation",
                series.name()
            )));
        }
        series.set_primary_kind(VarKind::Observation);
        Ok(Self {
            series: series.dropna(),
            meta: ObsMeta::new(1.0, None, Attrs::new())?,
        })
    }

    pub fn x(&self) -> Option<f64> {
        match self.series.coords() {
            Coordinates::Fixed { x, .. } => *x,
            Coordinates::Moving { .. } => None,
        }
    }

    pub fn y(&self) -> Option<f64> {
        match self.series.coords() {
            Coordinates::Fixed { y, .. } => *y,
            Coordinates::Moving { .. } => None,
        }
    }

    pub fn z(&self) -> Option<f64> {
        match self.series.coords() {
            Coordinates::Fixed { z, .. } => *z,
            Coordinates::Moving { .. } => None,
        }
    }
}

impl TrackObservation {
    pub fn builder(table: DataTable) -> TrackObservationBuilder {
        TrackObservationBuilder {
            table,
            input: TrackInput::default(),
            weight: 1.0,
            color: None,
            attrs: Attrs::new(),
        }
    }

    /// Wrap an existing track series. Its primary variable becomes the observed values.
    pub fn from_series(mut series: TimeSeries) -> SkillResult<Self> {
        if !series.coords().is_moving() {
            return Err(SkillError::invalid_type(format!(
                "'{}' has a fixed position, use a point observation",
                series.name()
            )));
        }
        series.set_primary_kind(VarKind::Observation);
        Ok(Self {
            series: series.dropna(),
            meta: ObsMeta::new(1.0, None, Attrs::new())?,
        })
    }

    pub fn x(&self) -> Vec<f64> {
        self.series.coords().x_values(self.series.n_points())
    }

    pub fn y(&self) -> Vec<f64> {
        self.series.coords().y_values(self.series.n_points())
    }
}

macro_rules! impl_observation_common {
    ($ty:ty) => {
        impl $ty {
            pub fn name(&self) -> &str {
                self.series.name()
            }

            pub fn series(&self) -> &TimeSeries {
                &self.series
            }

            pub fn time(&self) -> &[NaiveDateTime] {
                self.series.time()
            }

            pub fn values(&self) -> &[f64] {
                self.series.values()
            }

            pub fn n_points(&self) -> usize {
                self.series.n_points()
            }

            pub fn quantity(&self) -> &Quantity {
                self.series.quantity()
            }

            pub fn weight(&self) -> f64 {
                self.meta.weight
            }

            pub fn set_weight(&mut self, weight: f64) -> SkillResult<()> {
                validate_weight(weight)?;
                self.meta.weight = weight;
                Ok(())
            }

            pub fn color(&self) -> &str {
                &self.meta.color
            }

            pub fn attrs(&self) -> &Attrs {
                &self.meta.attrs
            }

            /// Set a user attribute. Built-in keys are rejected.
            pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> SkillResult<()> {
                let mut attrs = self.meta.attrs.clone();
                attrs.insert(key.into(), value.into());
                validate_user_attrs(&attrs)?;
                self.meta.attrs = attrs;
                Ok(())
            }

            pub fn with_name(mut self, name: impl Into<String>) -> SkillResult<Self> {
                self.series.set_name(name)?;
                Ok(self)
            }

            /// Copy restricted to `start <= t <= end`.
            pub fn trim(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
                Self {
                    series: self.series.trim(start, end),
                    meta: self.meta.clone(),
                }
            }

            pub(crate) fn with_meta(series: TimeSeries, weight: f64, color: Option<String>, attrs: Attrs) -> SkillResult<Self> {
                Ok(Self {
                    series,
                    meta: ObsMeta::new(weight, color, attrs)?,
                })
            }
        }
    };
}

impl_observation_common!(PointObservation);
impl_observation_common!(TrackObservation);

/// Builder for [`PointObservation`].
#[derive(Debug, Clone)]
pub struct PointObservationBuilder {
    table: DataTable,
    input: PointInput,
    weight: f64,
    color: Option<String>,
    attrs: Attrs,
}

impl PointObservationBuilder {
    pub fn item(mut self, item: impl Into<ItemRef>) -> Self {
        self.input.item = Some(item.into());
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

    /// Set the position from optional coordinates, e.g. when read from a config file.
    pub fn position(mut self, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        self.input.x = x;
        self.input.y = y;
        self.input.z = z;
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

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SkillResult<PointObservation> {
        let series = self.input.parse(self.table, VarKind::Observation)?;
        PointObservation::with_meta(series, self.weight, self.color, self.attrs)
    }
}

/// Builder for [`TrackObservation`].
#[derive(Debug, Clone)]
pub struct TrackObservationBuilder {
    table: DataTable,
    input: TrackInput,
    weight: f64,
    color: Option<String>,
    attrs: Attrs,
}

impl TrackObservationBuilder {
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

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SkillResult<TrackObservation> {
        let series = self.input.parse(self.table, VarKind::Observation)?;
        TrackObservation::with_meta(series, self.weight, self.color, self.attrs)
    }
}

/// Any observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Point(PointObservation),
    Track(TrackObservation),
}

impl Observation {
    pub fn name(&self) -> &str {
        self.series().name()
    }

    pub fn series(&self) -> &TimeSeries {
        match self {
            Observation::Point(o) => o.series(),
            Observation::Track(o) => o.series(),
        }
    }

    pub fn gtype(&self) -> GeometryType {
        match self {
            Observation::Point(_) => GeometryType::Point,
            Observation::Track(_) => GeometryType::Track,
        }
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        self.series().time()
    }

    pub fn values(&self) -> &[f64] {
        self.series().values()
    }

    pub fn n_points(&self) -> usize {
        self.series().n_points()
    }

    pub fn quantity(&self) -> &Quantity {
        self.series().quantity()
    }

    pub fn weight(&self) -> f64 {
        match self {
            Observation::Point(o) => o.weight(),
            Observation::Track(o) => o.weight(),
        }
    }

    pub fn color(&self) -> &str {
        match self {
            Observation::Point(o) => o.color(),
            Observation::Track(o) => o.color(),
        }
    }

    pub fn attrs(&self) -> &Attrs {
        match self {
            Observation::Point(o) => o.attrs(),
            Observation::Track(o) => o.attrs(),
        }
    }

    /// Copy restricted to `start <= t <= end`.
    pub fn trim(&self, start: NaiveDateTime, end: NaiveDateTime) -> Observation {
        match self {
            Observation::Point(o) => Observation::Point(o.trim(start, end)),
            Observation::Track(o) => Observation::Track(o.trim(start, end)),
        }
    }

    /// Wrap a series as a point or track observation depending on its coordinates.
    pub fn from_series(series: TimeSeries) -> SkillResult<Observation> {
        if series.coords().is_moving() {
            TrackObservation::from_series(series).map(Observation::Track)
        } else {
            PointObservation::from_series(series).map(Observation::Point)
        }
    }

    /// Same as [`Observation::from_series`] but keeping weight, color and attrs.
    pub fn from_series_with_meta(series: TimeSeries, weight: f64, color: &str, attrs: Attrs) -> SkillResult<Observation> {
        let mut series = series;
        series.set_primary_kind(VarKind::Observation);
        let series = series.dropna();
        if series.coords().is_moving() {
            TrackObservation::with_meta(series, weight, Some(color.to_string()), attrs).map(Observation::Track)
        } else {
            PointObservation::with_meta(series, weight, Some(color.to_string()), attrs).map(Observation::Point)
        }
    }
}

impl From<PointObservation> for Observation {
    fn from(o: PointObservation) -> Self {
        Observation::Point(o)
    }
}

impl From<TrackObservation> for Observation {
    fn from(o: TrackObservation) -> Self {
        Observation::Track(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use test_utils::daily_times;

    fn table() -> DataTable {
        DataTable::with_time_index(
            daily_times("2019-01-01", 4),
            vec![Column::float("WL", vec![0.1, f64::NAN, 0.3, 0.4])],
        )
        .unwrap()
    }

    #[test]
    fn test_point_defaults() {
        let obs = PointObservation::builder(table()).x(12.9).y(55.5).build().unwrap();
        assert_eq!(obs.name(), "WL");
        assert_eq!(obs.n_points(), 3);
        assert_eq!(obs.weight(), 1.0);
        assert_eq!(obs.color(), DEFAULT_OBS_COLOR);
        assert!(obs.quantity().is_undefined());
        assert_eq!(obs.x(), Some(12.9));
        assert_eq!(obs.z(), None);
    }

    #[test]
    fn test_reserved_attr_rejected() {
        let err = PointObservation::builder(table()).attr("gtype", "track").build();
        assert!(err.is_err());
        let obs = PointObservation::builder(table()).attr("station_id", 3i64).build().unwrap();
        assert_eq!(obs.attrs().get("station_id"), Some(&AttrValue::Int(3)));
    }

    #[test]
    fn test_negative_weight_rejected() {
        assert!(PointObservation::builder(table()).weight(-1.0).build().is_err());
    }

    #[test]
    fn test_from_series_checks_geometry() {
        let obs = PointObservation::builder(table()).build().unwrap();
        assert!(TrackObservation::from_series(obs.series().clone()).is_err());
        let wrapped = Observation::from_series(obs.series().clone()).unwrap();
        assert_eq!(wrapped.gtype(), GeometryType::Point);
    }
}
