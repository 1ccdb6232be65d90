//! Spatial coordinates of a series: one fixed position or one position per timestamp.

use serde::{Deserialize, Serialize};
use skill_common::{GeometryType, SkillError, SkillResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coordinates {
    /// Point geometry. Any component may be unknown.
    Fixed {
        x: Option<f64>,
        y: Option<f64>,
        z: Option<f64>,
    },
    /// Track geometry: x and y have the same length as the time axis.
    Moving { x: Vec<f64>, y: Vec<f64> },
}

impl Coordinates {
    pub fn fixed(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Coordinates::Fixed { x, y, z }
    }

    pub fn unknown() -> Self {
        Coordinates::Fixed {
            x: None,
            y: None,
            z: None,
        }
    }

    pub fn moving(x: Vec<f64>, y: Vec<f64>) -> SkillResult<Self> {
        if x.len() != y.len() {
            return Err(SkillError::invalid_value(format!(
                "track x and y must have equal length, got {} and {}",
                x.len(),
                y.len()
            )));
        }
        Ok(Coordinates::Moving { x, y })
    }

    pub fn gtype(&self) -> GeometryType {
        match self {
            Coordinates::Fixed { .. } => GeometryType::Point,
            Coordinates::Moving { .. } => GeometryType::Track,
        }
    }

    pub fn is_moving(&self) -> bool {
        matches!(self, Coordinates::Moving { .. })
    }

    pub(crate) fn check_len(&self, n: usize) -> SkillResult<()> {
        match self {
            Coordinates::Moving { x, .. } if x.len() != n => Err(SkillError::invalid_value(format!(
                "track has {} positions but {} timestamps",
                x.len(),
                n
            ))),
            _ => Ok(()),
        }
    }

    /// Coordinates at the given rows; fixed coordinates are unchanged.
    pub fn take(&self, rows: &[usize]) -> Coordinates {
        match self {
            Coordinates::Fixed { .. } => self.clone(),
            Coordinates::Moving { x, y } => Coordinates::Moving {
                x: rows.iter().map(|&i| x[i]).collect(),
                y: rows.iter().map(|&i| y[i]).collect(),
            },
        }
    }

    /// x per row, broadcasting a fixed position. Unknown positions are NaN.
    pub fn x_values(&self, n: usize) -> Vec<f64> {
        match self {
            Coordinates::Fixed { x, .. } => vec![x.unwrap_or(f64::NAN); n],
            Coordinates::Moving { x, .. } => x.clone(),
        }
    }

    /// y per row, broadcasting a fixed position. Unknown positions are NaN.
    pub fn y_values(&self, n: usize) -> Vec<f64> {
        match self {
            Coordinates::Fixed { y, .. } => vec![y.unwrap_or(f64::NAN); n],
            Coordinates::Moving { y, .. } => y.clone(),
        }
    }
}
