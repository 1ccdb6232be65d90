//! Spatial selection areas: bounding boxes and polygons.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{SkillError, SkillResult};

/// An area used to select matched data by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Area {
    /// Selects points strictly inside the box.
    BBox(BoundingBox),
    /// Closed polygon given by its vertices (x, y).
    Polygon(Vec<(f64, f64)>),
}

impl Area {
    /// Interpret a flat coordinate list.
    ///
    /// Four values are a bbox `[x0, y0, x1, y1]`. Six or more values with an
    /// even count are polygon vertices `[x0, y0, x1, y1, ...]`.
    pub fn from_values(values: &[f64]) -> SkillResult<Self> {
        if values.len() == 4 {
            return Ok(Area::BBox(BoundingBox::try_from(values)?));
        }
        if values.len() > 5 && values.len() % 2 == 0 {
            let vertices = values.chunks_exact(2).map(|c| (c[0], c[1])).collect();
            return Area::polygon(vertices);
        }
        Err(SkillError::invalid_value(format!(
            "area must be a bbox [x0, y0, x1, y1] or an even list of polygon vertices, got {} values",
            values.len()
        )))
    }

    /// Build a polygon area from an N×2 vertex list, N ≥ 3.
    pub fn polygon(vertices: Vec<(f64, f64)>) -> SkillResult<Self> {
        if vertices.len() < 3 {
            return Err(SkillError::invalid_value(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(SkillError::invalid_value("polygon vertices must be finite"));
        }
        Ok(Area::Polygon(vertices))
    }

    /// Check whether a point is inside the area.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        match self {
            Area::BBox(bbox) => bbox.contains_point_strict(x, y),
            Area::Polygon(vertices) => point_in_polygon(vertices, x, y),
        }
    }

    /// Per-point containment mask.
    pub fn contains_points(&self, x: &[f64], y: &[f64]) -> Vec<bool> {
        x.iter().zip(y).map(|(&px, &py)| self.contains(px, py)).collect()
    }
}

impl From<BoundingBox> for Area {
    fn from(bbox: BoundingBox) -> Self {
        Area::BBox(bbox)
    }
}

/// Even-odd ray casting test.
///
/// The polygon is implicitly closed; a repeated first vertex at the end is harmless.
pub fn point_in_polygon(vertices: &[(f64, f64)], x: f64, y: f64) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) {
            let x_cross = xi + (y - yi) * (xj - xi) / (yj - yi);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_values_is_bbox() {
        let area = Area::from_values(&[9.9, 54.9, 10.25, 55.25]).unwrap();
        assert!(matches!(area, Area::BBox(_)));
        assert!(area.contains(10.1, 55.1));
        assert!(!area.contains(10.3, 55.3));
    }

    #[test]
    fn test_odd_length_rejected() {
        assert!(Area::from_values(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).is_err());
        assert!(Area::from_values(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_polygon_needs_three_vertices() {
        assert!(Area::polygon(vec![(0.0, 0.0), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_triangle_contains() {
        let tri = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)];
        assert!(point_in_polygon(&tri, 1.0, 1.0));
        assert!(!point_in_polygon(&tri, 3.0, 3.0));
    }

    #[test]
    fn test_nan_point_is_outside() {
        let area = Area::from(BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert!(!area.contains(f64::NAN, 0.5));
    }
}
