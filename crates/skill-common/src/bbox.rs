//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::SkillError;

/// An axis-aligned bounding box in model coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Smallest box enclosing all finite coordinate pairs, or None if there are none.
    pub fn from_points(x: &[f64], y: &[f64]) -> Option<Self> {
        let mut bbox: Option<Self> = None;
        for (&px, &py) in x.iter().zip(y) {
            if !px.is_finite() || !py.is_finite() {
                continue;
            }
            bbox = Some(match bbox {
                None => Self::new(px, py, px, py),
                Some(b) => Self::new(b.min_x.min(px), b.min_y.min(py), b.max_x.max(px), b.max_y.max(py)),
            });
        }
        bbox
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point is contained within this bbox, edges included.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if a point lies strictly inside this bbox. Points on an edge are outside.
    pub fn contains_point_strict(&self, x: f64, y: f64) -> bool {
        x > self.min_x && x < self.max_x && y > self.min_y && y < self.max_y
    }
}

impl TryFrom<&[f64]> for BoundingBox {
    type Error = SkillError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        match values {
            [x0, y0, x1, y1] => Ok(Self::new(*x0, *y0, *x1, *y1)),
            _ => Err(SkillError::invalid_value(format!(
                "bbox needs 4 values (x0, y0, x1, y1), got {}",
                values.len()
            ))),
        }
    }
}
