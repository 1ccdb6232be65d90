//! Time series containers, tabular input and observations.
//!
//! Raw input arrives as a [`DataTable`]. Observation and model-result
//! builders normalise it into a [`TimeSeries`]: a strictly increasing
//! time axis, one or more named variables, and fixed or moving coordinates.

pub mod coords;
pub mod duplicates;
pub mod interp;
pub mod observation;
pub mod parse;
pub mod series;
pub mod synonyms;
pub mod table;
pub mod variable;

pub use coords::Coordinates;
pub use duplicates::DuplicatePolicy;
pub use interp::{interp_time, within_model_gap};
pub use observation::{
    Observation, PointObservation, PointObservationBuilder, TrackObservation, TrackObservationBuilder,
};
pub use parse::{PointInput, TrackInput};
pub use series::TimeSeries;
pub use table::{Column, ColumnData, DataTable, SeriesReader, TableIndex};
pub use variable::{VarKind, Variable};

/// Default color of observations in plots and tables.
pub const DEFAULT_OBS_COLOR: &str = "#d62728";
