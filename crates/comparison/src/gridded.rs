//! Skill aggregated on spatial bins.

use skill_common::{SkillError, SkillResult};

use crate::long_table::LongTable;
use crate::metrics::Metric;
use crate::skill::{group_rows, metric_values, GroupBy, KeyValue};

/// How to bin one spatial axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Bins {
    /// Number of bins; edges are quantiles of the positions.
    Count(usize),
    /// Explicit, strictly increasing bin edges.
    Edges(Vec<f64>),
}

impl Default for Bins {
    fn default() -> Self {
        Bins::Count(5)
    }
}

/// Parameters of a gridded skill assessment.
#[derive(Debug, Clone, Default)]
pub struct GriddedSkillOptions {
    /// Bins along x and y. Ignored when `binsize` is set.
    pub bins: (Bins, Bins),
    /// Fixed bin width, centred on the rounded mean position.
    pub binsize: Option<f64>,
    pub by: Option<Vec<GroupBy>>,
    pub metrics: Option<Vec<Metric>>,
    /// Cells with fewer points get missing metric values.
    pub n_min: Option<usize>,
}

impl GriddedSkillOptions {
    pub fn with_bins(mut self, bins: Bins) -> Self {
        self.bins = (bins.clone(), bins);
        self
    }

    pub fn with_binsize(mut self, binsize: f64) -> Self {
        self.binsize = Some(binsize);
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_n_min(mut self, n_min: usize) -> Self {
        self.n_min = Some(n_min);
        self
    }

    pub fn with_by(mut self, by: Vec<GroupBy>) -> Self {
        self.by = Some(by);
        self
    }
}

/// Edges and centres of one binned axis.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Axis {
    pub edges: Vec<f64>,
    pub centres: Vec<f64>,
}

impl Axis {
    fn from_edges(edges: Vec<f64>) -> SkillResult<Self> {
        if edges.len() < 2 || edges.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(SkillError::invalid_value("bin edges must be at least two strictly increasing values"));
        }
        let centres = edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect();
        Ok(Self { edges, centres })
    }

    fn quantiles(values: &[f64], count: usize) -> SkillResult<Self> {
        if count == 0 {
            return Err(SkillError::invalid_value("number of bins must be positive"));
        }
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return Err(SkillError::no_data("no finite positions to bin"));
        }
        sorted.sort_by(f64::total_cmp);
        let (lo, hi) = (sorted[0], sorted[sorted.len() - 1]);
        if lo == hi {
            return Axis::from_edges(vec![lo - 0.5, hi + 0.5]);
        }
        let mut edges: Vec<f64> = (0..=count)
            .map(|i| quantile(&sorted, i as f64 / count as f64))
            .collect();
        edges.dedup();
        Axis::from_edges(edges)
    }

    fn fixed_width(values: &[f64], binsize: f64) -> SkillResult<Self> {
        if !(binsize > 0.0) || !binsize.is_finite() {
            return Err(SkillError::invalid_value(format!("binsize must be positive, got {binsize}")));
        }
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(SkillError::no_data("no finite positions to bin"));
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let c0 = mean.round();
        let (lo, hi) = finite
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let k_of = |v: f64| ((v - c0) / binsize - 0.5).ceil() as i64;
        let (k_lo, k_hi) = (k_of(lo), k_of(hi));
        let centres: Vec<f64> = (k_lo..=k_hi).map(|k| c0 + k as f64 * binsize).collect();
        let edges: Vec<f64> = (k_lo..=k_hi + 1).map(|k| c0 + (k as f64 - 0.5) * binsize).collect();
        Ok(Self { edges, centres })
    }

    /// Bin index of `v`: bins are right-closed, the first one includes its lower edge.
    pub fn index(&self, v: f64) -> Option<usize> {
        let j = self.edges.partition_point(|e| *e < v);
        if j == 0 {
            (v == self.edges[0]).then_some(0)
        } else if j == self.edges.len() {
            None
        } else {
            Some(j - 1)
        }
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let frac = pos - i as f64;
    if i + 1 < sorted.len() {
        sorted[i] + frac * (sorted[i + 1] - sorted[i])
    } else {
        sorted[i]
    }
}

fn axis_for(values: &[f64], bins: &Bins, binsize: Option<f64>) -> SkillResult<Axis> {
    match (binsize, bins) {
        (Some(bs), _) => Axis::fixed_width(values, bs),
        (None, Bins::Count(k)) => Axis::quantiles(values, *k),
        (None, Bins::Edges(edges)) => Axis::from_edges(edges.clone()),
    }
}

/// Skill metrics per spatial cell and group.
///
/// Cells are stored group-major then row-major: `[group][y][x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillGrid {
    x: Vec<f64>,
    y: Vec<f64>,
    by: Vec<String>,
    groups: Vec<Vec<KeyValue>>,
    metrics: Vec<String>,
    n: Vec<usize>,
    values: Vec<Vec<f64>>,
    mod_names: Vec<String>,
    obs_names: Vec<String>,
}

impl SkillGrid {
    /// Bin centres along x.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Bin centres along y.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn by(&self) -> &[String] {
        &self.by
    }

    pub fn groups(&self) -> &[Vec<KeyValue>] {
        &self.groups
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn mod_names(&self) -> &[String] {
        &self.mod_names
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    /// `n` followed by the metric names.
    pub fn field_names(&self) -> Vec<String> {
        std::iter::once("n".to_string()).chain(self.metrics.iter().cloned()).collect()
    }

    fn group_index(&self, group: Option<&str>) -> SkillResult<usize> {
        match group {
            None if self.groups.len() == 1 => Ok(0),
            None => Err(SkillError::invalid_value(format!(
                "skill grid has {} groups, select one of {:?}",
                self.groups.len(),
                self.group_labels()
            ))),
            Some(label) => self
                .group_labels()
                .iter()
                .position(|l| l == label)
                .ok_or_else(|| SkillError::not_found(format!("group '{label}' in skill grid"))),
        }
    }

    /// Group labels: key values joined by '/'.
    pub fn group_labels(&self) -> Vec<String> {
        self.groups
            .iter()
            .map(|keys| keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join("/"))
            .collect()
    }

    fn slab<T: Copy>(&self, data: &[T], g: usize) -> Vec<Vec<T>> {
        let (nx, ny) = (self.x.len(), self.y.len());
        let start = g * nx * ny;
        (0..ny)
            .map(|iy| data[start + iy * nx..start + (iy + 1) * nx].to_vec())
            .collect()
    }

    /// One metric as a `[y][x]` array.
    pub fn metric(&self, name: &str, group: Option<&str>) -> SkillResult<Vec<Vec<f64>>> {
        let m = self
            .metrics
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| SkillError::not_found(format!("metric '{name}' in skill grid")))?;
        let g = self.group_index(group)?;
        Ok(self.slab(&self.values[m], g))
    }

    /// Point counts as a `[y][x]` array.
    pub fn n(&self, group: Option<&str>) -> SkillResult<Vec<Vec<usize>>> {
        let g = self.group_index(group)?;
        Ok(self.slab(&self.n, g))
    }
}

/// Default grouping for gridded skill: only dimensions with several labels.
pub(crate) fn default_gridded_by(n_models: usize, n_obs: usize) -> Vec<GroupBy> {
    let mut by = Vec::new();
    if n_models > 1 {
        by.push(GroupBy::Model);
    }
    if n_obs > 1 {
        by.push(GroupBy::Observation);
    }
    by
}

pub(crate) fn compute_gridded(
    table: &LongTable,
    by: &[GroupBy],
    metrics: &[Metric],
    bins: &(Bins, Bins),
    binsize: Option<f64>,
    n_min: Option<usize>,
) -> SkillResult<SkillGrid> {
    if table.is_empty() {
        return Err(SkillError::no_data("No data to compare"));
    }
    let x_axis = axis_for(&table.x, &bins.0, binsize)?;
    let y_axis = axis_for(&table.y, &bins.1, binsize)?;
    let (nx, ny) = (x_axis.len(), y_axis.len());
    let cells: Vec<Option<usize>> = table
        .x
        .iter()
        .zip(&table.y)
        .map(|(x, y)| Some(y_axis.index(*y)? * nx + x_axis.index(*x)?))
        .collect();

    let grouping = group_rows(table, by)?;
    let n_groups = grouping.groups.len();
    let mut n = vec![0usize; n_groups * ny * nx];
    let mut values = vec![vec![f64::NAN; n_groups * ny * nx]; metrics.len()];
    let mut groups = Vec::with_capacity(n_groups);

    for (g, (keys, rows)) in grouping.groups.into_iter().enumerate() {
        let mut per_cell: Vec<Vec<usize>> = vec![Vec::new(); ny * nx];
        for row in rows {
            if let Some(cell) = cells[row] {
                per_cell[cell].push(row);
            }
        }
        for (cell, rows) in per_cell.iter().enumerate() {
            let flat = g * ny * nx + cell;
            n[flat] = rows.len();
            if rows.is_empty() || n_min.is_some_and(|min| rows.len() < min) {
                continue;
            }
            for (m, v) in metric_values(table, rows, metrics).into_iter().enumerate() {
                values[m][flat] = v;
            }
        }
        groups.push(keys);
    }

    Ok(SkillGrid {
        x: x_axis.centres,
        y: y_axis.centres,
        by: grouping.names,
        groups,
        metrics: metrics.iter().map(|m| m.name().to_string()).collect(),
        n,
        values,
        mod_names: table.model_names(),
        obs_names: table.observation_names(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, hourly_times};

    fn table() -> LongTable {
        let n = 8;
        LongTable {
            model: vec!["m1".to_string(); n],
            observation: vec!["alti".to_string(); n],
            time: hourly_times("2019-01-01", n),
            x: vec![0.1, 0.4, 0.6, 0.9, 1.1, 1.4, 1.6, 1.9],
            y: vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0],
            obs_val: vec![1.0; n],
            mod_val: vec![1.5, 1.5, 1.5, 1.5, 2.0, 2.0, 2.0, 2.0],
            aux: vec![],
        }
    }

    #[test]
    fn test_axis_index_right_closed() {
        let axis = Axis::from_edges(vec![0.0, 1.0, 2.0]).unwrap();
        assert_eq!(axis.index(0.0), Some(0));
        assert_eq!(axis.index(1.0), Some(0));
        assert_eq!(axis.index(1.5), Some(1));
        assert_eq!(axis.index(2.5), None);
        assert_eq!(axis.index(-0.1), None);
        assert_eq!(axis.index(f64::NAN), None);
        assert!(Axis::from_edges(vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_fixed_width_axis() {
        let axis = Axis::fixed_width(&[0.2, 1.9, 3.1], 1.0).unwrap();
        assert_eq!(axis.centres, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(axis.edges[0], -0.5);
        assert_eq!(axis.index(1.9), Some(2));
    }

    #[test]
    fn test_gridded_bias_per_cell() {
        let metrics = vec![Metric::from_name("bias").unwrap()];
        let bins = (Bins::Edges(vec![0.0, 1.0, 2.0]), Bins::Edges(vec![-0.5, 0.5, 1.5]));
        let grid = compute_gridded(&table(), &[], &metrics, &bins, None, None).unwrap();
        assert_eq!(grid.x(), &[0.5, 1.5]);
        assert_eq!(grid.y(), &[0.0, 1.0]);
        let bias = grid.metric("bias", None).unwrap();
        assert_approx_eq!(bias[0][0], 0.5, 1e-12);
        assert!(bias[0][1].is_nan());
        assert!(bias[1][0].is_nan());
        assert_approx_eq!(bias[1][1], 1.0, 1e-12);
        assert_eq!(grid.n(None).unwrap(), vec![vec![4, 0], vec![0, 4]]);
        assert_eq!(grid.field_names(), vec!["n", "bias"]);
        assert_eq!(grid.mod_names(), &["m1".to_string()]);
    }

    #[test]
    fn test_n_min_masks_cells() {
        let metrics = vec![Metric::from_name("bias").unwrap()];
        let bins = (Bins::Count(4), Bins::Count(1));
        let grid = compute_gridded(&table(), &[], &metrics, &bins, None, Some(3)).unwrap();
        let bias = grid.metric("bias", None).unwrap();
        assert!(bias[0].iter().all(|v| v.is_nan()));
        assert_eq!(grid.n(None).unwrap()[0].iter().sum::<usize>(), 8);
    }

    #[test]
    fn test_group_selection() {
        let mut t = table();
        t.extend(LongTable {
            model: vec!["m2".to_string(); 8],
            ..table()
        });
        let metrics = vec![Metric::from_name("rmse").unwrap()];
        let grid = compute_gridded(&t, &[GroupBy::Model], &metrics, &Default::default(), None, None).unwrap();
        assert!(grid.metric("rmse", None).is_err());
        assert!(grid.metric("rmse", Some("m2")).is_ok());
        assert_eq!(grid.group_labels(), vec!["m1", "m2"]);
    }
}
