//! Matching observations with model results and assessing model skill.
//!
//! [`match_observation`] aligns one observation with one or more model
//! results in space and time and returns a [`Comparer`]. [`match_many`]
//! does the same for several observations and returns a
//! [`ComparerCollection`]. Both support subsetting, bias removal, skill
//! tables grouped by model, observation or time, and gridded skill.

pub mod collection;
pub mod comparer;
pub mod compat;
pub mod gridded;
pub mod long_table;
pub mod matching;
pub mod metrics;
pub mod options;
mod persist;
pub mod query;
pub mod skill;

pub use collection::{ComparerCollection, MeanWeights};
pub use comparer::{BiasCorrection, Comparer, Concatenated, RowView, Selection, TimeSelection};
pub use gridded::{Bins, GriddedSkillOptions, SkillGrid};
pub use long_table::LongTable;
pub use matching::{from_matched, match_many, match_observation, match_space_time, FromMatchedBuilder, MatchOptions};
pub use metrics::Metric;
pub use query::Query;
pub use skill::{GroupBy, KeyValue, SkillRow, SkillTable, TimeAttr};
