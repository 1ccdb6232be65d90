//! Older entry points kept as thin adapters over the current API.
//!
//! Every adapter logs a deprecation warning and delegates.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use model_result::ModelResult;
use skill_common::{Area, ItemRef, SkillResult};
use timeseries::duplicates::DEFAULT_DUPLICATE_OFFSET_SECS;
use timeseries::{DuplicatePolicy, Observation};
use tracing::warn;

use crate::collection::ComparerCollection;
use crate::comparer::{Comparer, Selection};
use crate::gridded::{GriddedSkillOptions, SkillGrid};
use crate::matching::{match_many, MatchOptions};
use crate::metrics::Metric;
use crate::skill::{GroupBy, SkillTable};

/// Former name of [`match_many`].
#[deprecated(note = "use match_many")]
pub fn compare(
    observations: &[Observation],
    models: &[ModelResult],
    options: &MatchOptions,
) -> SkillResult<ComparerCollection> {
    warn!("compare() is deprecated, use match_many() instead");
    match_many(observations, models, options)
}

impl Comparer {
    #[deprecated(note = "use gridded_skill")]
    pub fn spatial_skill(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        warn!(comparer = %self.name(), "spatial_skill() is deprecated, use gridded_skill() instead");
        self.gridded_skill(options)
    }
}

impl ComparerCollection {
    #[deprecated(note = "use gridded_skill")]
    pub fn spatial_skill(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        warn!("spatial_skill() is deprecated, use gridded_skill() instead");
        self.gridded_skill(options)
    }
}

/// Anything skill can be computed on after a selection.
pub trait SkillSource: Sized {
    fn select(&self, selection: &Selection) -> SkillResult<Self>;
    fn skill_table(&self, by: Option<&[GroupBy]>, metrics: Option<&[Metric]>) -> SkillResult<SkillTable>;
    fn score_map(&self, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>>;
    fn skill_grid(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid>;
}

impl SkillSource for Comparer {
    fn select(&self, selection: &Selection) -> SkillResult<Self> {
        self.sel(selection)
    }

    fn skill_table(&self, by: Option<&[GroupBy]>, metrics: Option<&[Metric]>) -> SkillResult<SkillTable> {
        self.skill(by, metrics)
    }

    fn score_map(&self, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>> {
        self.score(metric)
    }

    fn skill_grid(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        self.gridded_skill(options)
    }
}

impl SkillSource for ComparerCollection {
    fn select(&self, selection: &Selection) -> SkillResult<Self> {
        self.sel(selection)
    }

    fn skill_table(&self, by: Option<&[GroupBy]>, metrics: Option<&[Metric]>) -> SkillResult<SkillTable> {
        self.skill(by, metrics)
    }

    fn score_map(&self, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>> {
        self.score(metric)
    }

    fn skill_grid(&self, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        self.gridded_skill(options)
    }
}

/// Selection arguments that skill methods used to accept directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillArgs {
    pub model: Option<ItemRef>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub area: Option<Area>,
}

impl SkillArgs {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.start.is_none() && self.end.is_none() && self.area.is_none()
    }

    pub fn to_selection(&self) -> Selection {
        Selection {
            model: self.model.clone().map(|m| vec![m]),
            start: self.start,
            end: self.end,
            area: self.area.clone(),
            ..Selection::default()
        }
    }

    fn apply<S: SkillSource>(&self, source: &S, method: &str) -> SkillResult<S> {
        warn!(
            method,
            "passing model, start, end or area to {method}() is deprecated, use sel() first"
        );
        source.select(&self.to_selection())
    }

    pub fn skill<S: SkillSource>(
        &self,
        source: &S,
        by: Option<&[GroupBy]>,
        metrics: Option<&[Metric]>,
    ) -> SkillResult<SkillTable> {
        if self.is_empty() {
            return source.skill_table(by, metrics);
        }
        self.apply(source, "skill")?.skill_table(by, metrics)
    }

    pub fn score<S: SkillSource>(&self, source: &S, metric: Option<&Metric>) -> SkillResult<BTreeMap<String, f64>> {
        if self.is_empty() {
            return source.score_map(metric);
        }
        self.apply(source, "score")?.score_map(metric)
    }

    pub fn gridded_skill<S: SkillSource>(&self, source: &S, options: &GriddedSkillOptions) -> SkillResult<SkillGrid> {
        if self.is_empty() {
            return source.skill_grid(options);
        }
        self.apply(source, "gridded_skill")?.skill_grid(options)
    }
}

/// Translate the old `offset_duplicates` seconds argument of track
/// observations into a duplicate policy. The old default maps to `None`.
pub fn offset_duplicates(secs: f64) -> SkillResult<Option<DuplicatePolicy>> {
    if (secs - DEFAULT_DUPLICATE_OFFSET_SECS).abs() < f64::EPSILON {
        return Ok(None);
    }
    warn!(
        offset_duplicates = secs,
        "offset_duplicates is deprecated, use keep_duplicates(DuplicatePolicy::Offset(..)) instead"
    );
    DuplicatePolicy::offset_secs(secs).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skill_common::{Attrs, Quantity};
    use test_utils::{daily_times, ts};
    use timeseries::{Coordinates, TimeSeries, VarKind, Variable};

    fn comparer() -> Comparer {
        let data = TimeSeries::new(
            "obs",
            daily_times("2019-01-01", 4),
            vec![
                Variable::new("Observation", VarKind::Observation, vec![1.0, 2.0, 3.0, 4.0]),
                Variable::new("m1", VarKind::Model, vec![1.0, 2.0, 3.0, 5.0]),
                Variable::new("m2", VarKind::Model, vec![2.0, 3.0, 4.0, 5.0]),
            ],
            Coordinates::fixed(Some(0.0), Some(0.0), None),
            Quantity::new("Water Level", "m"),
        )
        .unwrap();
        Comparer::new(data, Vec::new(), 1.0, "#d62728", Attrs::new()).unwrap()
    }

    #[test]
    fn test_skill_args_select_first() {
        let cmp = comparer();
        let args = SkillArgs {
            model: Some(ItemRef::from("m1")),
            end: Some(ts("2019-01-03")),
            ..SkillArgs::default()
        };
        let sk = args.skill(&cmp, None, None).unwrap();
        assert_eq!(sk.n(), vec![3]);
        assert_eq!(sk.metric("bias").unwrap(), vec![0.0]);

        let score = args.score(&cmp, None).unwrap();
        assert_eq!(score.keys().collect::<Vec<_>>(), vec!["m1"]);
    }

    #[test]
    fn test_empty_args_pass_through() {
        let cmp = comparer();
        let score = SkillArgs::default().score(&cmp, None).unwrap();
        assert_eq!(score.len(), 2);
    }

    #[test]
    fn test_offset_duplicates() {
        assert_eq!(offset_duplicates(0.001).unwrap(), None);
        assert_eq!(
            offset_duplicates(0.5).unwrap(),
            Some(DuplicatePolicy::Offset(chrono::Duration::milliseconds(500)))
        );
        assert!(offset_duplicates(-1.0).is_err());
    }
}
