//! Test data generators for synthetic time series, grids and tracks.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Parses "YYYY-MM-DD" or "YYYY-MM-DDTHH:MM:SS" into a timestamp. Panics on bad input.
///
/// # Example
///
/// ```
/// use test_utils::ts;
///
/// assert_eq!(ts("2019-01-01"), ts("2019-01-01T00:00:00"));
/// ```
pub fn ts(s: &str) -> NaiveDateTime {
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return t;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        .unwrap_or_else(|_| panic!("invalid test timestamp '{s}'"))
}

/// Regular time axis of `n` steps starting at `start`.
pub fn regular_times(start: &str, step: Duration, n: usize) -> Vec<NaiveDateTime> {
    let t0 = ts(start);
    (0..n).map(|i| t0 + step * i as i32).collect()
}

/// Daily time axis of `n` days starting at `start`.
///
/// # Example
///
/// ```
/// use test_utils::{daily_times, ts};
///
/// let t = daily_times("2019-01-01", 3);
/// assert_eq!(t[2], ts("2019-01-03"));
/// ```
pub fn daily_times(start: &str, n: usize) -> Vec<NaiveDateTime> {
    regular_times(start, Duration::days(1), n)
}

/// Hourly time axis of `n` hours starting at `start`.
pub fn hourly_times(start: &str, n: usize) -> Vec<NaiveDateTime> {
    regular_times(start, Duration::hours(1), n)
}

/// Evenly spaced axis of `n` values from `start` with spacing `step`.
pub fn regular_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Creates a gridded field laid out `[time][y][x]` with predictable values.
///
/// Each cell value is calculated as: `t * 100 + y * 10 + x` (indices),
/// which is linear in every index so interpolation results are exact.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(2, 3, 4);
/// assert_eq!(grid.len(), 2 * 3 * 4);
/// assert_eq!(grid[0], 0.0);
/// assert_eq!(grid[1], 1.0);    // x = 1
/// assert_eq!(grid[4], 10.0);   // y = 1
/// assert_eq!(grid[12], 100.0); // t = 1
/// ```
pub fn create_test_grid(nt: usize, ny: usize, nx: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(nt * ny * nx);
    for t in 0..nt {
        for y in 0..ny {
            for x in 0..nx {
                data.push((t * 100 + y * 10 + x) as f64);
            }
        }
    }
    data
}

/// Straight track from `(x0, y0)` to `(x1, y1)` in `n` equal steps.
pub fn linear_track(x0: f64, y0: f64, x1: f64, y1: f64, n: usize) -> (Vec<f64>, Vec<f64>) {
    if n < 2 {
        return (vec![x0; n], vec![y0; n]);
    }
    let fx = (x1 - x0) / (n - 1) as f64;
    let fy = (y1 - y0) / (n - 1) as f64;
    (regular_axis(x0, fx, n), regular_axis(y0, fy, n))
}

/// Sine wave with the given amplitude and period (in samples) plus an offset.
pub fn sine_series(n: usize, amplitude: f64, period: f64, offset: f64) -> Vec<f64> {
    (0..n)
        .map(|i| offset + amplitude * (2.0 * std::f64::consts::PI * i as f64 / period).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hourly_times() {
        let t = hourly_times("2020-06-01", 25);
        assert_eq!(t.len(), 25);
        assert_eq!(t[24], ts("2020-06-02"));
    }

    #[test]
    fn test_linear_track_endpoints() {
        let (x, y) = linear_track(0.0, 10.0, 4.0, 14.0, 5);
        assert_eq!(x, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(y[4], 14.0);
    }

    #[test]
    fn test_sine_series_offset() {
        let s = sine_series(4, 1.0, 4.0, 2.0);
        assert!((s[0] - 2.0).abs() < 1e-12);
        assert!((s[1] - 3.0).abs() < 1e-12);
    }
}
