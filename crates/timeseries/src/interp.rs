//! Temporal interpolation and model-gap screening.

use chrono::{Duration, NaiveDateTime};
use skill_common::{SkillError, SkillResult};

use crate::series::TimeSeries;
use crate::variable::Variable;

fn seconds_between(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    let d = b - a;
    match d.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}

/// Linear interpolation of a point series onto `new_time`.
///
/// Each variable is interpolated from its own non-missing samples, so a gap
/// in one column leaves the others untouched. Targets outside a variable's
/// remaining span get NaN; targets on one of its timestamps get that value.
pub fn interp_time(series: &TimeSeries, new_time: &[NaiveDateTime]) -> SkillResult<TimeSeries> {
    if series.coords().is_moving() {
        return Err(SkillError::invalid_type(format!(
            "temporal interpolation needs a point series, '{}' is a track",
            series.name()
        )));
    }
    let time = series.time();
    let variables: Vec<Variable> = series
        .variables()
        .iter()
        .map(|var| {
            let (src, values): (Vec<NaiveDateTime>, Vec<f64>) = time
                .iter()
                .zip(&var.values)
                .filter(|(_, v)| !v.is_nan())
                .map(|(t, v)| (*t, *v))
                .unzip();
            let interpolated = new_time.iter().map(|&t| interp_one(&src, &values, t)).collect();
            Variable::new(var.name.clone(), var.kind, interpolated)
        })
        .collect();

    TimeSeries::new(
        series.name(),
        new_time.to_vec(),
        variables,
        series.coords().clone(),
        series.quantity().clone(),
    )
}

fn interp_one(src: &[NaiveDateTime], values: &[f64], t: NaiveDateTime) -> f64 {
    let j = src.partition_point(|s| *s < t);
    if j < src.len() && src[j] == t {
        values[j]
    } else if j == 0 || j == src.len() {
        f64::NAN
    } else {
        let w = seconds_between(src[j - 1], t) / seconds_between(src[j - 1], src[j]);
        values[j - 1] + w * (values[j] - values[j - 1])
    }
}

/// For each query time, whether the model timestamps bracketing it are at most `max_gap` apart.
///
/// The bracket of `t` is the last model time at or before `t` and the model
/// time after that one. A query time equal to a model time is always valid;
/// query times outside the model span never are.
pub fn within_model_gap(query: &[NaiveDateTime], model_time: &[NaiveDateTime], max_gap: Duration) -> Vec<bool> {
    let n = model_time.len();
    query
        .iter()
        .map(|t| {
            if n == 0 || *t < model_time[0] || *t > model_time[n - 1] {
                return false;
            }
            let a = model_time.partition_point(|m| m <= t) - 1;
            if model_time[a] == *t {
                return true;
            }
            let b = (a + 1).min(n - 1);
            model_time[b] - model_time[a] <= max_gap
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Coordinates, VarKind};
    use skill_common::Quantity;
    use test_utils::{assert_approx_eq, hourly_times, ts};

    fn model() -> TimeSeries {
        TimeSeries::new(
            "m",
            hourly_times("2019-01-01", 4),
            vec![Variable::new("m", VarKind::Model, vec![0.0, 1.0, f64::NAN, 3.0])],
            Coordinates::fixed(Some(0.0), Some(0.0), None),
            Quantity::undefined(),
        )
        .unwrap()
    }

    #[test]
    fn test_interp_inside_only() {
        let target = vec![
            ts("2018-12-31T23:00:00"),
            ts("2019-01-01T00:30:00"),
            ts("2019-01-01T02:00:00"),
            ts("2019-01-01T03:00:00"),
            ts("2019-01-01T04:00:00"),
        ];
        let out = interp_time(&model(), &target).unwrap();
        let v = out.values();
        assert!(v[0].is_nan());
        assert_approx_eq!(v[1], 0.5, 1e-12);
        // the NaN row is skipped, so 01:00 -> 03:00 is bridged
        assert_approx_eq!(v[2], 2.0, 1e-12);
        assert_approx_eq!(v[3], 3.0, 1e-12);
        assert!(v[4].is_nan());
    }

    #[test]
    fn test_aux_gap_does_not_drop_model_sample() {
        let series = TimeSeries::new(
            "m",
            hourly_times("2019-01-01", 3),
            vec![
                Variable::new("m", VarKind::Model, vec![0.0, 10.0, 20.0]),
                Variable::new("wind", VarKind::Auxiliary, vec![1.0, f64::NAN, 3.0]),
            ],
            Coordinates::fixed(Some(0.0), Some(0.0), None),
            Quantity::undefined(),
        )
        .unwrap();
        let target = vec![ts("2019-01-01T01:00:00"), ts("2019-01-01T01:30:00")];
        let out = interp_time(&series, &target).unwrap();

        let m = &out.variable("m").unwrap().values;
        assert_approx_eq!(m[0], 10.0, 1e-12);
        assert_approx_eq!(m[1], 15.0, 1e-12);
        // wind bridges its own gap
        let wind = &out.variable("wind").unwrap().values;
        assert_approx_eq!(wind[0], 2.0, 1e-12);
        assert_approx_eq!(wind[1], 2.5, 1e-12);
    }

    #[test]
    fn test_gap_bracket() {
        let model_time = vec![ts("2019-01-01T00:00:00"), ts("2019-01-01T01:00:00"), ts("2019-01-01T05:00:00")];
        let query = vec![
            ts("2019-01-01T00:30:00"),
            ts("2019-01-01T02:00:00"),
            ts("2019-01-01T05:00:00"),
            ts("2019-01-01T06:00:00"),
        ];
        let ok = within_model_gap(&query, &model_time, Duration::hours(2));
        assert_eq!(ok, vec![true, false, true, false]);
    }

    #[test]
    fn test_exact_hit_is_valid() {
        let model_time = vec![ts("2019-01-01T00:00:00"), ts("2019-01-01T10:00:00")];
        let query = [ts("2019-01-01T00:00:00"), ts("2019-01-01T00:10:00")];
        let ok = within_model_gap(&query, &model_time, Duration::hours(1));
        assert_eq!(ok, vec![true, false]);
    }
}
