//! Geometry types of observations and model results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SkillError;

/// Spatial layout of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    /// Fixed location time series.
    Point,
    /// Moving location: one (x, y) per timestamp.
    Track,
    /// Regular rectilinear grid.
    Grid,
    /// Flexible mesh of triangles and quadrilaterals.
    Unstructured,
}

impl GeometryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "point",
            GeometryType::Track => "track",
            GeometryType::Grid => "grid",
            GeometryType::Unstructured => "unstructured",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryType {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "point" => Ok(GeometryType::Point),
            "track" => Ok(GeometryType::Track),
            "grid" => Ok(GeometryType::Grid),
            "unstructured" | "flexible mesh" | "mesh" | "dfsu" => Ok(GeometryType::Unstructured),
            other => Err(SkillError::invalid_value(format!("unknown geometry type '{other}'"))),
        }
    }
}
