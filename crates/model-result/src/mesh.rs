//! Flexible mesh geometry and element lookup.

use std::fmt;

use skill_common::area::point_in_polygon;
use skill_common::{BoundingBox, SkillError, SkillResult};

/// Spatial lookup on an unstructured mesh of element-centred values.
///
/// Implementations may use any spatial index; the bundled [`MeshGeometry`]
/// does a bbox-prefiltered linear scan.
pub trait ElementLocator: fmt::Debug + Send + Sync {
    fn n_elements(&self) -> usize;

    /// Index of the element containing the point, if any.
    fn find_element(&self, x: f64, y: f64) -> Option<usize>;

    fn contains(&self, x: f64, y: f64) -> bool {
        self.find_element(x, y).is_some()
    }

    /// Centre of an element.
    fn element_center(&self, element: usize) -> (f64, f64);

    /// Weights for spatial interpolation at a point, summing to one.
    ///
    /// The default uses the containing element only.
    fn interpolation_weights(&self, x: f64, y: f64) -> Option<Vec<(usize, f64)>> {
        self.find_element(x, y).map(|e| vec![(e, 1.0)])
    }

    fn bbox(&self) -> Option<BoundingBox>;
}

/// A mesh of triangles and quadrilaterals.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshGeometry {
    nodes: Vec<(f64, f64)>,
    elements: Vec<Vec<usize>>,
    centers: Vec<(f64, f64)>,
    element_bboxes: Vec<BoundingBox>,
    node_elements: Vec<Vec<usize>>,
}

const EDGE_EPS: f64 = 1e-10;

impl MeshGeometry {
    /// Build a mesh from node coordinates and element node tables (3 or 4 nodes each).
    pub fn new(nodes: Vec<(f64, f64)>, elements: Vec<Vec<usize>>) -> SkillResult<Self> {
        if elements.is_empty() {
            return Err(SkillError::invalid_value("mesh has no elements"));
        }
        let mut node_elements = vec![Vec::new(); nodes.len()];
        let mut centers = Vec::with_capacity(elements.len());
        let mut element_bboxes = Vec::with_capacity(elements.len());

        for (e, element) in elements.iter().enumerate() {
            if element.len() != 3 && element.len() != 4 {
                return Err(SkillError::invalid_value(format!(
                    "element {e} has {} nodes, expected 3 or 4",
                    element.len()
                )));
            }
            if let Some(bad) = element.iter().find(|&&n| n >= nodes.len()) {
                return Err(SkillError::invalid_value(format!(
                    "element {e} refers to node {bad}, mesh has {} nodes",
                    nodes.len()
                )));
            }
            let xs: Vec<f64> = element.iter().map(|&n| nodes[n].0).collect();
            let ys: Vec<f64> = element.iter().map(|&n| nodes[n].1).collect();
            let k = element.len() as f64;
            centers.push((xs.iter().sum::<f64>() / k, ys.iter().sum::<f64>() / k));
            element_bboxes.push(
                BoundingBox::from_points(&xs, &ys)
                    .ok_or_else(|| SkillError::invalid_value(format!("element {e} has non-finite nodes")))?,
            );
            for &n in element {
                node_elements[n].push(e);
            }
        }

        Ok(Self {
            nodes,
            elements,
            centers,
            element_bboxes,
            node_elements,
        })
    }

    pub fn nodes(&self) -> &[(f64, f64)] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Vec<usize>] {
        &self.elements
    }

    fn polygon(&self, element: usize) -> Vec<(f64, f64)> {
        self.elements[element].iter().map(|&n| self.nodes[n]).collect()
    }

    fn on_boundary(&self, element: usize, x: f64, y: f64) -> bool {
        let poly = self.polygon(element);
        (0..poly.len()).any(|i| {
            let (a, b) = (poly[i], poly[(i + 1) % poly.len()]);
            distance_to_segment(a, b, x, y) < EDGE_EPS
        })
    }

    /// Elements sharing a node with `element`, including itself.
    fn neighbourhood(&self, element: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.elements[element]
            .iter()
            .flat_map(|&n| self.node_elements[n].iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn distance_to_segment(a: (f64, f64), b: (f64, f64), x: f64, y: f64) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 == 0.0 {
        0.0
    } else {
        (((x - a.0) * dx + (y - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (px, py) = (a.0 + t * dx, a.1 + t * dy);
    (x - px).hypot(y - py)
}

impl ElementLocator for MeshGeometry {
    fn n_elements(&self) -> usize {
        self.elements.len()
    }

    fn find_element(&self, x: f64, y: f64) -> Option<usize> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let candidates: Vec<usize> = (0..self.elements.len())
            .filter(|&e| self.element_bboxes[e].contains_point(x, y))
            .collect();
        candidates
            .iter()
            .copied()
            .find(|&e| point_in_polygon(&self.polygon(e), x, y))
            // ray casting is ambiguous exactly on an edge
            .or_else(|| candidates.iter().copied().find(|&e| self.on_boundary(e, x, y)))
    }

    fn element_center(&self, element: usize) -> (f64, f64) {
        self.centers[element]
    }

    /// Inverse-distance weights (power 2) over the containing element and its neighbours.
    fn interpolation_weights(&self, x: f64, y: f64) -> Option<Vec<(usize, f64)>> {
        let element = self.find_element(x, y)?;
        let neighbours = self.neighbourhood(element);
        let mut weights = Vec::with_capacity(neighbours.len());
        for e in neighbours {
            let (cx, cy) = self.centers[e];
            let d = (cx - x).hypot(cy - y);
            if d < EDGE_EPS {
                return Some(vec![(e, 1.0)]);
            }
            weights.push((e, 1.0 / (d * d)));
        }
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        Some(weights.into_iter().map(|(e, w)| (e, w / total)).collect())
    }

    fn bbox(&self) -> Option<BoundingBox> {
        let xs: Vec<f64> = self.nodes.iter().map(|n| n.0).collect();
        let ys: Vec<f64> = self.nodes.iter().map(|n| n.1).collect();
        BoundingBox::from_points(&xs, &ys)
    }
}
