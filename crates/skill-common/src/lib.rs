//! Common types and utilities shared across the model-skill workspace.

pub mod area;
pub mod attrs;
pub mod bbox;
pub mod error;
pub mod geometry;
pub mod item;
pub mod options;
pub mod quantity;
pub mod time;

pub use area::Area;
pub use attrs::{AttrValue, Attrs};
pub use bbox::BoundingBox;
pub use error::{SkillError, SkillResult};
pub use geometry::GeometryType;
pub use item::ItemRef;
pub use options::{get_option, register_option, reset_option, set_option, OptionValue};
pub use quantity::Quantity;
pub use time::{round_to_resolution, Frequency, Period};

/// Name of the observation variable in matched data.
pub const OBSERVATION_VAR: &str = "Observation";

/// Variable names that cannot be used for models or auxiliary data.
pub const RESERVED_NAMES: [&str; 5] = ["Observation", "time", "x", "y", "z"];

/// Check whether a name is reserved for built-in variables or coordinates.
pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}
