//! Interpolation methods for extracting model values.
//!
//! Grid positions are expressed as fractional indices along ascending axes.

use chrono::NaiveDateTime;
use num_traits::Float;

/// Fractional index of `v` on an ascending axis, or None outside it.
///
/// A single-element axis only matches its own value.
pub fn axis_fraction<T: Float>(axis: &[T], v: T) -> Option<f64> {
    let n = axis.len();
    if n == 0 || v.is_nan() || v < axis[0] || v > axis[n - 1] {
        return None;
    }
    let j = axis.partition_point(|a| *a < v);
    if j < n && axis[j] == v {
        return Some(j as f64);
    }
    // axis[j - 1] < v < axis[j]
    let w = ((v - axis[j - 1]) / (axis[j] - axis[j - 1])).to_f64()?;
    Some((j - 1) as f64 + w)
}

/// Index of the axis value nearest to `v`, or None outside the axis. Ties go to the lower index.
pub fn nearest_index<T: Float>(axis: &[T], v: T) -> Option<usize> {
    let f = axis_fraction(axis, v)?;
    let lo = f.floor() as usize;
    if f - lo as f64 > 0.5 {
        Some(lo + 1)
    } else {
        Some(lo)
    }
}

/// Fractional index of `t` on a strictly increasing time axis, or None outside it.
pub fn time_fraction(axis: &[NaiveDateTime], t: NaiveDateTime) -> Option<f64> {
    let n = axis.len();
    if n == 0 || t < axis[0] || t > axis[n - 1] {
        return None;
    }
    let j = axis.partition_point(|a| *a < t);
    if axis[j] == t {
        return Some(j as f64);
    }
    let span = (axis[j] - axis[j - 1]).num_microseconds()? as f64;
    let part = (t - axis[j - 1]).num_microseconds()? as f64;
    Some((j - 1) as f64 + part / span)
}

/// Bilinear interpolation in index space.
///
/// Smoothly interpolates between the four nearest grid points.
pub fn bilinear_interpolate(data: &[f64], width: usize, height: usize, x: f64, y: f64) -> f64 {
    if x < 0.0 || y < 0.0 || width == 0 || height == 0 {
        return f64::NAN;
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;

    if x0 >= width || y0 >= height {
        return f64::NAN;
    }

    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let v00 = data[y0 * width + x0];
    let v10 = data[y0 * width + x1];
    let v01 = data[y1 * width + x0];
    let v11 = data[y1 * width + x1];

    // Handle NaN values - if any corner is NaN, return NaN
    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return f64::NAN;
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    top * (1.0 - yf) + bottom * yf
}

/// Linear blend of two time slices at fractional time index `ft`.
///
/// `slice_value` returns the value at a whole time index.
pub fn temporal_blend(ft: f64, n_time: usize, slice_value: impl Fn(usize) -> f64) -> f64 {
    let t0 = ft.floor() as usize;
    let w = ft - t0 as f64;
    if w == 0.0 || t0 + 1 >= n_time {
        return slice_value(t0.min(n_time.saturating_sub(1)));
    }
    let v0 = slice_value(t0);
    let v1 = slice_value(t0 + 1);
    v0 * (1.0 - w) + v1 * w
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, hourly_times, ts};

    #[test]
    fn test_bilinear_interpolate() {
        #[rustfmt::skip]
        let data: Vec<f64> = vec![
            1.0, 2.0,
            3.0, 4.0,
        ];

        // Corners
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 0.0), 1.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 0.0), 2.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 0.0, 1.0), 3.0);
        assert_eq!(bilinear_interpolate(&data, 2, 2, 1.0, 1.0), 4.0);

        // Center
        assert_approx_eq!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5), 2.5, 1e-12);
    }

    #[test]
    fn test_bilinear_nan_corner() {
        let data = vec![1.0, f64::NAN, 3.0, 4.0];
        assert!(bilinear_interpolate(&data, 2, 2, 0.5, 0.5).is_nan());
    }

    #[test]
    fn test_axis_fraction() {
        let axis = [0.0, 1.0, 3.0];
        assert_eq!(axis_fraction(&axis, 1.0), Some(1.0));
        assert_eq!(axis_fraction(&axis, 2.0), Some(1.5));
        assert_eq!(axis_fraction(&axis, 3.5), None);
        assert_eq!(axis_fraction(&[2.0], 2.0), Some(0.0));
        assert_eq!(nearest_index(&axis, 2.1), Some(2));
        assert_eq!(nearest_index(&axis, 0.5), Some(0));
    }

    #[test]
    fn test_time_fraction() {
        let axis = hourly_times("2019-01-01", 3);
        assert_eq!(time_fraction(&axis, ts("2019-01-01T01:30:00")), Some(1.5));
        assert_eq!(time_fraction(&axis, ts("2019-01-01T02:00:00")), Some(2.0));
        assert_eq!(time_fraction(&axis, ts("2019-01-01T03:00:00")), None);
    }

    #[test]
    fn test_temporal_blend() {
        let v = [10.0, 20.0];
        assert_approx_eq!(temporal_blend(0.25, 2, |i| v[i]), 12.5, 1e-12);
        assert_eq!(temporal_blend(1.0, 2, |i| v[i]), 20.0);
    }
}
